//! Workflow graph data structures and topology indexing.
//!
//! A [`Workflow`] is the immutable, author-time description of a learning
//! path: an ordered list of [`Node`]s and [`Edge`]s. [`GraphIndex`] is the
//! runtime-built adjacency index the scheduler drives traversal from —
//! built once per execution and reused for every node visit, rather than
//! re-scanning the edge list on every lookup.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result, ValidationIssue};

/// Port label carried on an edge leaving a `conditional` node for the
/// branch not taken.
pub const PORT_FALSE: &str = "false";
/// Port label for the branch taken when a `conditional` node's condition holds.
pub const PORT_TRUE: &str = "true";
/// Port label marking a `loop` node's continuation edge (taken once the
/// loop has run `maxIterations` times).
pub const PORT_CONTINUE: &str = "continue";

/// A single pedagogical step in a workflow.
///
/// A node is a pure description — it never holds runtime state. Its
/// `kind` is a free-form string at this layer; `elpa-runners` maps it onto
/// the closed [`NodeKind`](https://docs.rs/elpa-runners) set, treating
/// anything unrecognized as a skip rather than a parse failure, so that a
/// newer workflow authored against a newer kind set still loads here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub label: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            config: Map::new(),
            label: None,
        }
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }
}

/// A directed connection between two nodes, optionally tagged with source
/// and target ports used by branching/looping node kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, rename = "sourcePort")]
    pub source_port: Option<String>,
    #[serde(default, rename = "targetPort")]
    pub target_port: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        let id = format!("{source}->{target}");
        Self {
            id,
            source,
            target,
            source_port: None,
            target_port: None,
        }
    }

    pub fn with_source_port(mut self, port: impl Into<String>) -> Self {
        self.source_port = Some(port.into());
        self
    }
}

/// An author-time workflow definition. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, rename = "targetGrades")]
    pub target_grades: Vec<String>,
    #[serde(default, rename = "targetProficiencyLevels")]
    pub target_proficiency_levels: Vec<u8>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            target_grades: Vec::new(),
            target_proficiency_levels: Vec::new(),
            category: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Topology index over a [`Workflow`]: adjacency lookups, entry-node
/// discovery, and structural validation.
///
/// Built once per execution and handed to the scheduler; never mutated
/// after construction (the workflow itself is immutable for the run).
#[derive(Debug, Clone)]
pub struct GraphIndex {
    nodes: HashMap<String, Node>,
    outgoing: HashMap<String, Vec<Edge>>,
    incoming: HashMap<String, Vec<Edge>>,
    entry_nodes: Vec<String>,
    node_order: Vec<String>,
}

impl GraphIndex {
    /// Validate and index a workflow: every edge's `source`/`target` must
    /// reference an existing node, and node identifiers must be unique.
    ///
    /// A workflow with zero nodes is structurally valid here — it indexes
    /// to an empty entry-node list, and the scheduler's "no entry nodes"
    /// rule completes it trivially. Callers that want to reject an empty
    /// workflow outright (the HTTP layer does) enforce that separately,
    /// before ever reaching this index.
    pub fn build(workflow: &Workflow) -> std::result::Result<Self, Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let mut nodes = HashMap::new();
        let mut node_order = Vec::new();
        for (i, node) in workflow.nodes.iter().enumerate() {
            if nodes.insert(node.id.clone(), node.clone()).is_some() {
                issues.push(ValidationIssue::new(
                    format!("nodes[{i}].id"),
                    format!("duplicate node id '{}'", node.id),
                ));
            }
            node_order.push(node.id.clone());
        }

        let mut outgoing: HashMap<String, Vec<Edge>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<Edge>> = HashMap::new();
        for (i, edge) in workflow.edges.iter().enumerate() {
            if !nodes.contains_key(&edge.source) {
                issues.push(ValidationIssue::new(
                    format!("edges[{i}].source"),
                    format!("edge references unknown source node '{}'", edge.source),
                ));
            }
            if !nodes.contains_key(&edge.target) {
                issues.push(ValidationIssue::new(
                    format!("edges[{i}].target"),
                    format!("edge references unknown target node '{}'", edge.target),
                ));
            }
            outgoing.entry(edge.source.clone()).or_default().push(edge.clone());
            incoming.entry(edge.target.clone()).or_default().push(edge.clone());
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        let targets: HashSet<&str> = workflow.edges.iter().map(|e| e.target.as_str()).collect();
        let entry_nodes = node_order
            .iter()
            .filter(|id| !targets.contains(id.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            nodes,
            outgoing,
            incoming,
            entry_nodes,
            node_order,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn require_node(&self, id: &str) -> Result<&Node> {
        self.nodes.get(id).ok_or_else(|| CoreError::UnknownNode(id.to_string()))
    }

    pub fn outgoing(&self, id: &str) -> &[Edge] {
        self.outgoing.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn incoming(&self, id: &str) -> &[Edge] {
        self.incoming.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn entry_nodes(&self) -> &[String] {
        &self.entry_nodes
    }

    pub fn node_count(&self) -> usize {
        self.node_order.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.node_order.iter().map(|s| s.as_str())
    }

    /// Breadth-first reachability from `start` (inclusive) without ever
    /// stepping through `avoid`. Used by the loop scheduler to compute a
    /// loop's body subgraph once and reuse it across iterations.
    pub fn reachable_from(&self, start: &str, avoid: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        if start == avoid || !self.nodes.contains_key(start) {
            return seen;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start.to_string());
        seen.insert(start.to_string());
        while let Some(current) = queue.pop_front() {
            for edge in self.outgoing(&current) {
                if edge.target == avoid || seen.contains(&edge.target) {
                    continue;
                }
                seen.insert(edge.target.clone());
                queue.push_back(edge.target.clone());
            }
        }
        seen
    }

    /// Leaves of `subgraph`: nodes in the set with no outgoing edge to
    /// another member of the set. Used to decide when a loop body has
    /// finished a given iteration.
    pub fn leaves_of(&self, subgraph: &HashSet<String>) -> HashSet<String> {
        subgraph
            .iter()
            .filter(|id| {
                !self
                    .outgoing(id)
                    .iter()
                    .any(|e| subgraph.contains(&e.target))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_workflow() -> Workflow {
        let mut wf = Workflow::new("wf1", "Linear");
        wf.nodes.push(Node::new("a", "student-profile"));
        wf.nodes.push(Node::new("b", "content-generator"));
        wf.nodes.push(Node::new("c", "celebration"));
        wf.edges.push(Edge::new("a", "b"));
        wf.edges.push(Edge::new("b", "c"));
        wf
    }

    #[test]
    fn indexes_linear_workflow() {
        let wf = linear_workflow();
        let index = GraphIndex::build(&wf).unwrap();
        assert_eq!(index.entry_nodes(), &["a".to_string()]);
        assert_eq!(index.outgoing("a").len(), 1);
        assert_eq!(index.incoming("c").len(), 1);
        assert_eq!(index.node_count(), 3);
    }

    #[test]
    fn indexes_empty_workflow_with_no_entry_nodes() {
        let wf = Workflow::new("empty", "Empty");
        let index = GraphIndex::build(&wf).unwrap();
        assert!(index.entry_nodes().is_empty());
        assert_eq!(index.node_count(), 0);
    }

    #[test]
    fn rejects_dangling_edge() {
        let mut wf = linear_workflow();
        wf.edges.push(Edge::new("b", "ghost"));
        let err = GraphIndex::build(&wf).unwrap_err();
        assert!(err.iter().any(|i| i.message.contains("ghost")));
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let mut wf = Workflow::new("dup", "Dup");
        wf.nodes.push(Node::new("a", "student-profile"));
        wf.nodes.push(Node::new("a", "content-generator"));
        let err = GraphIndex::build(&wf).unwrap_err();
        assert!(err.iter().any(|i| i.message.contains("duplicate")));
    }

    #[test]
    fn reachable_from_stops_at_avoid_node() {
        let mut wf = Workflow::new("loopy", "Loopy");
        wf.nodes.push(Node::new("loop", "loop"));
        wf.nodes.push(Node::new("body1", "content-generator"));
        wf.nodes.push(Node::new("body2", "feedback-generator"));
        wf.edges.push(Edge::new("loop", "body1"));
        wf.edges.push(Edge::new("body1", "body2"));
        wf.edges.push(Edge::new("body2", "loop"));
        let index = GraphIndex::build(&wf).unwrap();
        let reachable = index.reachable_from("body1", "loop");
        assert!(reachable.contains("body1"));
        assert!(reachable.contains("body2"));
        assert!(!reachable.contains("loop"));

        let leaves = index.leaves_of(&reachable);
        assert_eq!(leaves, HashSet::from(["body2".to_string()]));
    }

    #[test]
    fn bodyless_loop_has_empty_subgraph() {
        let mut wf = Workflow::new("bodyless", "Bodyless");
        wf.nodes.push(Node::new("loop", "loop"));
        let index = GraphIndex::build(&wf).unwrap();
        // no body edge target exists; reachable_from on a non-existent id is empty
        let reachable = index.reachable_from("nowhere", "loop");
        assert!(reachable.is_empty());
    }
}
