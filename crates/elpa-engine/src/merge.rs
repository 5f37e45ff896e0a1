//! Merge-strategy resolution: how a `merge` node's
//! collected predecessor contributions become the single `input` value
//! handed to `MergeRunner`, which just wraps it under `merged`.

use elpa_core::{Node, ValidationIssue};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Concatenate,
    SelectBest,
    Aggregate,
    FirstComplete,
}

impl MergeStrategy {
    pub fn from_node(node: &Node) -> Self {
        match node.config.get("mergeStrategy").and_then(Value::as_str) {
            Some("select-best") => Self::SelectBest,
            Some("aggregate") => Self::Aggregate,
            Some("first-complete") => Self::FirstComplete,
            _ => Self::Concatenate,
        }
    }

    /// `select-best` requires `config.scoreField`: its absence fails
    /// workflow validation before execution starts rather than failing
    /// at runtime.
    pub fn validate(node: &Node, path: &str) -> Option<ValidationIssue> {
        if Self::from_node(node) == Self::SelectBest
            && node.config.get("scoreField").and_then(Value::as_str).is_none()
        {
            return Some(ValidationIssue::new(
                path,
                format!("merge node '{}' declares mergeStrategy=select-best without config.scoreField", node.id),
            ));
        }
        None
    }
}

/// One predecessor's contribution to a merge node's current visit, in
/// arrival order.
#[derive(Debug, Clone)]
pub struct MergeContribution {
    pub source_node_id: String,
    pub source_port: Option<String>,
    pub output: Value,
}

/// Builds the `input` value fed to `MergeRunner` under `strategy`.
/// `first-complete`'s "cancel pending siblings" is the scheduler's job —
/// by the time this runs, only the first arrival is ever passed in.
pub fn build_merge_input(strategy: MergeStrategy, score_field: Option<&str>, contributions: &[MergeContribution]) -> Value {
    match strategy {
        MergeStrategy::Concatenate => Value::Array(contributions.iter().map(|c| c.output.clone()).collect()),
        MergeStrategy::Aggregate => {
            let mut merged = Map::new();
            for c in contributions {
                if let Some(obj) = c.output.as_object() {
                    for (k, v) in obj {
                        merged.insert(k.clone(), v.clone());
                    }
                }
            }
            Value::Object(merged)
        }
        MergeStrategy::FirstComplete => contributions.first().map(|c| c.output.clone()).unwrap_or(Value::Null),
        MergeStrategy::SelectBest => {
            let field = score_field.unwrap_or_default();
            contributions
                .iter()
                .max_by(|a, b| {
                    let sa = a.output.get(field).and_then(Value::as_f64).unwrap_or(f64::MIN);
                    let sb = b.output.get(field).and_then(Value::as_f64).unwrap_or(f64::MIN);
                    sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|c| c.output.clone())
                .unwrap_or(Value::Null)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contribution(id: &str, output: Value) -> MergeContribution {
        MergeContribution { source_node_id: id.to_string(), source_port: None, output }
    }

    #[test]
    fn select_best_without_score_field_fails_validation() {
        let mut node = Node::new("m1", "merge");
        node.config.insert("mergeStrategy".to_string(), json!("select-best"));
        assert!(MergeStrategy::validate(&node, "nodes[0]").is_some());

        node.config.insert("scoreField".to_string(), json!("score"));
        assert!(MergeStrategy::validate(&node, "nodes[0]").is_none());
    }

    #[test]
    fn concatenate_preserves_arrival_order() {
        let contributions = vec![contribution("a", json!({"v": 1})), contribution("b", json!({"v": 2}))];
        let merged = build_merge_input(MergeStrategy::Concatenate, None, &contributions);
        assert_eq!(merged, json!([{"v": 1}, {"v": 2}]));
    }

    #[test]
    fn select_best_picks_highest_score_field() {
        let contributions = vec![
            contribution("a", json!({"score": 40})),
            contribution("b", json!({"score": 90})),
            contribution("c", json!({"score": 70})),
        ];
        let merged = build_merge_input(MergeStrategy::SelectBest, Some("score"), &contributions);
        assert_eq!(merged, json!({"score": 90}));
    }

    #[test]
    fn first_complete_takes_only_the_first_contribution() {
        let contributions = vec![contribution("a", json!({"v": "first"})), contribution("b", json!({"v": "second"}))];
        let merged = build_merge_input(MergeStrategy::FirstComplete, None, &contributions[..1]);
        assert_eq!(merged, json!({"v": "first"}));
    }

    #[test]
    fn aggregate_unions_fields_with_later_arrivals_winning() {
        let contributions = vec![contribution("a", json!({"x": 1, "y": 1})), contribution("b", json!({"y": 2}))];
        let merged = build_merge_input(MergeStrategy::Aggregate, None, &contributions);
        assert_eq!(merged, json!({"x": 1, "y": 2}));
    }
}
