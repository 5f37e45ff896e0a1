//! The graph scheduler: drives a [`GraphIndex`] from its entry
//! nodes to completion (or pause/cancel/awaiting-input), resolving
//! conditional/router branching, loop re-entry, and merge fan-in along
//! the way. Cooperative and single-threaded — ready nodes are drained one
//! at a time from a FIFO queue, never two runners concurrently.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use elpa_core::{
    Edge, ErrorKind, ExecutionError, ExecutionStatus, GraphIndex, Node, NodeExecutionRecord,
    Role, WorkflowExecutionRecord, PORT_CONTINUE, PORT_FALSE, PORT_TRUE,
};
use elpa_runners::{NodeRunnerRegistry, RunnerOutput};
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::control::ExecutionControl;
use crate::merge::{build_merge_input, MergeContribution, MergeStrategy};
use crate::observer::ExecutionObserver;

/// Per-node fan-in bookkeeping, keyed by node id.
#[derive(Debug, Default)]
struct NodeFanIn {
    pending: usize,
    contributions: Vec<MergeContribution>,
    /// Set once a `first-complete` merge has been scheduled, so later
    /// arrivals are absorbed silently instead of re-triggering it.
    scheduled: bool,
    /// Set once every incoming edge has resolved and none were live: this
    /// node can never be scheduled, and its own outgoing edges are fed into
    /// `resolve_incoming_edge` as dead so a downstream merge fed by a dead
    /// branch doesn't wait on an edge that will never arrive.
    dead: bool,
}

/// One loop node's current iteration: the body subgraph computed once via
/// `reachable_from`/`leaves_of`, and which of its leaves are still
/// outstanding for the iteration in progress.
struct LoopState {
    body_subgraph: HashSet<String>,
    leaves: HashSet<String>,
    remaining_leaves: HashSet<String>,
    iteration: u64,
}

/// What a runner resolution told the registry-lookup step.
enum Invocation {
    Ran(RunnerOutput),
    Skipped,
}

/// The result of draining one item off the ready queue.
enum StepOutcome {
    Continue,
    AwaitingInput { node_id: String, prompt: Value },
    Failed(ExecutionError),
}

/// What a full (or resumed) run settles into.
#[derive(Debug)]
pub enum SchedulerOutcome {
    Completed,
    AwaitingInput { node_id: String },
    Paused,
    Cancelled,
    Failed(ExecutionError),
}

pub struct Scheduler {
    graph: GraphIndex,
    registry: Arc<NodeRunnerRegistry>,
    observer: Arc<dyn ExecutionObserver>,
    control: ExecutionControl,
    default_node_timeout: Option<Duration>,
    fan_in: HashMap<String, NodeFanIn>,
    active_loops: HashMap<String, LoopState>,
    /// Every `loop` node's body subgraph, precomputed once: the back-edge
    /// that closes the loop (body leaf → loop head) must never count
    /// towards the loop head's fan-in, or it could never become ready in
    /// the first place.
    loop_bodies: HashMap<String, HashSet<String>>,
    ready: VecDeque<(String, Value)>,
    completed_count: usize,
    record: WorkflowExecutionRecord,
}

impl Scheduler {
    pub fn new(
        graph: GraphIndex,
        registry: Arc<NodeRunnerRegistry>,
        observer: Arc<dyn ExecutionObserver>,
        control: ExecutionControl,
        default_node_timeout: Option<Duration>,
        record: WorkflowExecutionRecord,
    ) -> Self {
        let mut fan_in = HashMap::new();
        let loop_bodies = precompute_loop_bodies(&graph);

        let mut ready = VecDeque::new();
        for node_id in graph.node_ids() {
            let total_incoming = graph.incoming(node_id).len();
            let back_edges = loop_bodies
                .get(node_id)
                .map(|body| graph.incoming(node_id).iter().filter(|e| body.contains(&e.source)).count())
                .unwrap_or(0);
            let pending = total_incoming - back_edges;
            fan_in.insert(node_id.to_string(), NodeFanIn { pending, contributions: Vec::new(), scheduled: false, dead: false });
            if pending == 0 {
                ready.push_back((node_id.to_string(), Value::Object(Map::new())));
            }
        }
        Self {
            graph,
            registry,
            observer,
            control,
            default_node_timeout,
            fan_in,
            active_loops: HashMap::new(),
            loop_bodies,
            ready,
            completed_count: 0,
            record,
        }
    }

    pub fn record(&self) -> &WorkflowExecutionRecord {
        &self.record
    }

    pub fn into_record(self) -> WorkflowExecutionRecord {
        self.record
    }

    pub fn control(&self) -> &ExecutionControl {
        &self.control
    }

    /// Runs until completion, a pause/cancel signal lands, a node asks to
    /// await human input, or a node fails.
    #[instrument(skip(self), fields(workflow_id = %self.record.workflow_id))]
    pub async fn run(&mut self) -> SchedulerOutcome {
        self.record.status = ExecutionStatus::Running;
        loop {
            if self.control.is_cancelled() {
                return self.finalize_cancelled().await;
            }
            if self.control.take_pause_request() {
                return self.finalize_paused();
            }
            let Some((node_id, input)) = self.ready.pop_front() else {
                break;
            };
            match self.execute_one(&node_id, input).await {
                StepOutcome::Continue => continue,
                StepOutcome::AwaitingInput { node_id, .. } => return self.finalize_awaiting(node_id),
                StepOutcome::Failed(err) => return self.finalize_failed(err).await,
            }
        }
        self.finalize_completed().await
    }

    /// Resumes a run paused at `AwaitingInput`, feeding the human's answer
    /// in as that node's resolved output before continuing the schedule.
    pub async fn resume_with_input(&mut self, human_input: Value) -> SchedulerOutcome {
        let Some(node_id) = self.record.current_node.clone() else {
            return SchedulerOutcome::Failed(ExecutionError::new(
                ErrorKind::InvalidWorkflow,
                "no node is awaiting input",
                None,
            ));
        };
        if let Some(rec) = self.record.node_executions.iter_mut().rev().find(|r| r.node_id == node_id) {
            let mut merged = rec.output.as_object().cloned().unwrap_or_default();
            merged.insert("userAnswer".to_string(), human_input.clone());
            merged.insert("awaiting".to_string(), json!(false));
            rec.output = Value::Object(merged);
        }
        let content = human_input.as_str().map(str::to_string).unwrap_or_else(|| human_input.to_string());
        self.record.context.push_history(Role::User, content, Some(node_id.clone()));

        let output = self
            .record
            .node_executions
            .iter()
            .rev()
            .find(|r| r.node_id == node_id)
            .map(|r| r.output.clone())
            .unwrap_or(human_input);

        let Some(node) = self.graph.node(&node_id).cloned() else {
            return SchedulerOutcome::Failed(ExecutionError::new(
                ErrorKind::InvalidWorkflow,
                format!("resumed node '{node_id}' no longer exists in the workflow"),
                Some(node_id),
            ));
        };
        let ports = self.live_ports(&node, &output);
        self.generic_fanout(&node.id, &output, ports);
        self.run().await
    }

    pub fn cancel_now(&self) {
        self.control.cancel();
    }

    async fn execute_one(&mut self, node_id: &str, input: Value) -> StepOutcome {
        if self.control.is_cancelled() {
            return StepOutcome::Failed(ExecutionError::new(ErrorKind::Cancelled, "execution cancelled", Some(node_id.to_string())));
        }
        let Some(node) = self.graph.node(node_id).cloned() else {
            return StepOutcome::Failed(ExecutionError::new(
                ErrorKind::InvalidWorkflow,
                format!("scheduled node '{node_id}' is not in the graph"),
                Some(node_id.to_string()),
            ));
        };

        if node.kind == "loop" {
            return self.route_loop(&node, input).await;
        }

        match self.invoke_runner(&node, input.clone()).await {
            Err(err) => StepOutcome::Failed(err),
            Ok(Invocation::Skipped) => {
                self.on_node_finished(&node.id).await;
                self.generic_fanout(&node.id, &input, None);
                StepOutcome::Continue
            }
            Ok(Invocation::Ran(output)) => {
                self.apply_side_channels(&output.output);
                self.on_node_finished(&node.id).await;
                if output.should_pause {
                    return StepOutcome::AwaitingInput { node_id: node.id.clone(), prompt: output.output.clone() };
                }
                let ports = self.live_ports(&node, &output.output);
                self.generic_fanout(&node.id, &output.output, ports);
                StepOutcome::Continue
            }
        }
    }

    /// Looks up and drives the node's runner, recording its visit and
    /// notifying the observer. `None` from the registry is a skip, not a
    /// failure: the node passes its input straight through.
    async fn invoke_runner(&mut self, node: &Node, input: Value) -> std::result::Result<Invocation, ExecutionError> {
        let Some(runner) = self.registry.get(&node.kind).cloned() else {
            debug!(node_id = %node.id, kind = %node.kind, "no runner registered, skipping");
            let mut rec = NodeExecutionRecord::new(&node.id, &node.kind, input);
            rec.skip();
            self.record.node_executions.push(rec);
            return Ok(Invocation::Skipped);
        };

        self.observer.on_node_start(&node.id, node).await;
        let mut rec = NodeExecutionRecord::new(&node.id, &node.kind, input.clone());
        rec.start();
        self.record.current_node = Some(node.id.clone());

        let timeout = node_timeout(node).or(self.default_node_timeout);
        let invocation = match timeout {
            Some(duration) => match tokio::time::timeout(duration, runner.run(node, input, &self.record.context)).await {
                Ok(inner) => inner.map_err(|e| ExecutionError::new(ErrorKind::RunnerFailure, e.to_string(), Some(node.id.clone()))),
                Err(_) => Err(ExecutionError::new(ErrorKind::Timeout, format!("node '{}' exceeded its timeout", node.id), Some(node.id.clone()))),
            },
            None => runner
                .run(node, input, &self.record.context)
                .await
                .map_err(|e| ExecutionError::new(ErrorKind::RunnerFailure, e.to_string(), Some(node.id.clone()))),
        };

        match invocation {
            Ok(output) => {
                rec.complete(output.output.clone());
                self.record.node_executions.push(rec);
                self.observer.on_node_complete(&node.id, &output.output).await;
                if output.streamed {
                    if let Some(text) = output.output.get("content").and_then(Value::as_str) {
                        self.observer.on_stream_token(&node.id, text).await;
                    }
                }
                Ok(Invocation::Ran(output))
            }
            Err(err) => {
                rec.fail(err.message.clone());
                self.record.node_executions.push(rec);
                self.observer.on_node_error(&node.id, &err.message).await;
                warn!(node_id = %node.id, error = %err.message, "node failed");
                Err(err)
            }
        }
    }

    /// A `loop` node's own type of routing: re-invokes its runner once per
    /// iteration, re-entering its body subgraph (computed via
    /// `reachable_from`/`leaves_of`) until the runner reports
    /// `isComplete`, then exits via its `continue`-tagged edge. A loop
    /// with no body edge at all re-enters immediately, without yielding
    /// the ready queue to any other node.
    fn route_loop<'a>(&'a mut self, node: &'a Node, input: Value) -> BoxFuture<'a, StepOutcome> {
        Box::pin(async move {
            if self.control.is_cancelled() {
                return StepOutcome::Failed(ExecutionError::new(ErrorKind::Cancelled, "execution cancelled", Some(node.id.clone())));
            }

            let mut input_obj = input.as_object().cloned().unwrap_or_default();
            let iteration = self.active_loops.get(&node.id).map(|s| s.iteration).unwrap_or(0);
            input_obj.insert("_loopIteration".to_string(), json!(iteration));

            let invocation = self.invoke_runner(node, Value::Object(input_obj)).await;
            let output = match invocation {
                Err(err) => return StepOutcome::Failed(err),
                Ok(Invocation::Skipped) => {
                    // No loop runner registered: exit immediately via the continue edge.
                    self.on_node_finished(&node.id).await;
                    self.active_loops.remove(&node.id);
                    self.fanout_loop_exit(node, &input);
                    return StepOutcome::Continue;
                }
                Ok(Invocation::Ran(output)) => output,
            };

            self.on_node_finished(&node.id).await;
            let next_iteration = output.output.get("iteration").and_then(Value::as_u64).unwrap_or(iteration + 1);
            // The runner's own `isComplete` is trusted first, but the
            // scheduler enforces `maxIterations` as a hard backstop (§4.5
            // Looping) regardless of what a misbehaving runner reports.
            let max_iterations = loop_max_iterations(node);
            let is_complete = output.output.get("isComplete").and_then(Value::as_bool).unwrap_or(true) || next_iteration >= max_iterations;

            if is_complete {
                self.active_loops.remove(&node.id);
                self.fanout_loop_exit(node, &output.output);
                return StepOutcome::Continue;
            }

            let body_edge = self
                .graph
                .outgoing(&node.id)
                .iter()
                .find(|e| e.source_port.as_deref() != Some(PORT_CONTINUE))
                .cloned();

            let Some(body_edge) = body_edge else {
                self.active_loops.insert(
                    node.id.clone(),
                    LoopState { body_subgraph: HashSet::new(), leaves: HashSet::new(), remaining_leaves: HashSet::new(), iteration: next_iteration },
                );
                return self.route_loop(node, Value::Object(Map::new())).await;
            };

            if !self.active_loops.contains_key(&node.id) {
                let body_subgraph = self.loop_bodies.get(&node.id).cloned().unwrap_or_default();
                let leaves = self.graph.leaves_of(&body_subgraph);
                self.reset_body_fan_in(&body_subgraph);
                self.active_loops.insert(
                    node.id.clone(),
                    LoopState { body_subgraph, leaves: leaves.clone(), remaining_leaves: leaves, iteration: next_iteration },
                );
            } else if let Some(state) = self.active_loops.get_mut(&node.id) {
                state.iteration = next_iteration;
                state.remaining_leaves = state.leaves.clone();
                let subgraph = state.body_subgraph.clone();
                self.reset_body_fan_in(&subgraph);
            }

            for edge in self.graph.outgoing(&node.id).to_vec() {
                let is_body_entry = edge.id == body_edge.id;
                self.resolve_incoming_edge(
                    &edge.target,
                    is_body_entry.then(|| MergeContribution {
                        source_node_id: node.id.clone(),
                        source_port: edge.source_port.clone(),
                        output: output.output.clone(),
                    }),
                    is_body_entry,
                );
            }
            StepOutcome::Continue
        })
    }

    fn reset_body_fan_in(&mut self, subgraph: &HashSet<String>) {
        for member in subgraph {
            let pending = self.graph.incoming(member).len();
            self.fan_in.insert(member.clone(), NodeFanIn { pending, contributions: Vec::new(), scheduled: false, dead: false });
        }
    }

    /// Fans out a loop node's exit. If the workflow tags one outgoing edge
    /// as `continue`, that's the only live edge and any body edge dies
    /// (it led back into the body, not out). Otherwise every outgoing
    /// edge is treated as the exit (the bodyless / untagged-single-edge
    /// convention).
    fn fanout_loop_exit(&mut self, node: &Node, output: &Value) {
        let edges = self.graph.outgoing(&node.id).to_vec();
        let has_continue_tag = edges.iter().any(|e| e.source_port.as_deref() == Some(PORT_CONTINUE));
        for edge in edges {
            let is_live = if has_continue_tag { edge.source_port.as_deref() == Some(PORT_CONTINUE) } else { true };
            self.resolve_incoming_edge(
                &edge.target,
                is_live.then(|| MergeContribution { source_node_id: node.id.clone(), source_port: edge.source_port.clone(), output: output.clone() }),
                is_live,
            );
        }
    }

    /// Which outgoing ports are "live" for this node's completed output.
    /// `None` means every outgoing edge fires regardless of port.
    fn live_ports(&self, node: &Node, output: &Value) -> Option<HashSet<String>> {
        match node.kind.as_str() {
            "conditional" => {
                let met = output.get("conditionMet").and_then(Value::as_bool).unwrap_or(false);
                Some(HashSet::from([if met { PORT_TRUE } else { PORT_FALSE }.to_string()]))
            }
            "proficiency-router" => output.get("route").and_then(Value::as_str).map(|r| HashSet::from([r.to_string()])),
            _ => None,
        }
    }

    /// Fans a completed node's output out across its outgoing edges,
    /// decrementing every target's fan-in counter and attaching a
    /// contribution only for ports that are live.
    fn generic_fanout(&mut self, node_id: &str, output: &Value, live_ports: Option<HashSet<String>>) {
        let edges: Vec<Edge> = self.graph.outgoing(node_id).to_vec();
        for edge in edges {
            // A body leaf's edge back into its own loop head is excluded from
            // the loop's fan-in up front (see `precompute_loop_bodies`) and is
            // re-entered explicitly once every body leaf finishes
            // (`on_node_finished`), not through the generic fan-in path.
            if self.loop_bodies.get(&edge.target).is_some_and(|body| body.contains(node_id)) {
                continue;
            }
            let is_live = match &live_ports {
                None => true,
                Some(ports) => edge.source_port.as_deref().map(|p| ports.contains(p)).unwrap_or(false),
            };
            self.resolve_incoming_edge(
                &edge.target,
                Some(MergeContribution { source_node_id: node_id.to_string(), source_port: edge.source_port.clone(), output: output.clone() }),
                is_live,
            );
        }
    }

    /// Decrements `target_id`'s fan-in counter and records a live
    /// contribution if one was provided, scheduling the target once every
    /// predecessor has resolved (or immediately, for a `first-complete`
    /// merge's first live arrival). If every incoming edge resolves without
    /// a single live contribution, `target_id` itself can never run — its
    /// dead status is propagated to its own outgoing edges so a downstream
    /// merge fed only by dead branches doesn't wait forever (§4.5
    /// Branching: "a downstream merge only waits for edges that are live").
    fn resolve_incoming_edge(&mut self, target_id: &str, contribution: Option<MergeContribution>, is_live: bool) {
        let pending_at_start = self.graph.incoming(target_id).len();
        let entry = self
            .fan_in
            .entry(target_id.to_string())
            .or_insert_with(|| NodeFanIn { pending: pending_at_start, contributions: Vec::new(), scheduled: false, dead: false });

        if entry.scheduled || entry.dead {
            return;
        }
        if entry.pending > 0 {
            entry.pending -= 1;
        }
        if is_live {
            if let Some(c) = contribution {
                entry.contributions.push(c);
            }
        }

        let is_first_complete = self
            .graph
            .node(target_id)
            .map(|n| n.kind == "merge" && MergeStrategy::from_node(n) == MergeStrategy::FirstComplete)
            .unwrap_or(false);

        let ready_now = if is_first_complete {
            !entry.contributions.is_empty()
        } else {
            entry.pending == 0 && !entry.contributions.is_empty()
        };

        if ready_now {
            entry.scheduled = true;
            let input = self.assemble_input(target_id);
            self.ready.push_back((target_id.to_string(), input));
            return;
        }

        if entry.pending == 0 && entry.contributions.is_empty() {
            entry.dead = true;
            self.propagate_dead(target_id);
        }
    }

    /// `node_id` just resolved as dead (every incoming edge arrived, none
    /// live) and will never be invoked. Feeds its own outgoing edges into
    /// `resolve_incoming_edge` as dead, recursively, so the dead branch's
    /// entire unreachable subtree resolves its fan-in instead of stalling a
    /// downstream merge forever.
    fn propagate_dead(&mut self, node_id: &str) {
        let edges: Vec<Edge> = self.graph.outgoing(node_id).to_vec();
        for edge in edges {
            if self.loop_bodies.get(&edge.target).is_some_and(|body| body.contains(node_id)) {
                continue;
            }
            self.resolve_incoming_edge(&edge.target, None, false);
        }
    }

    fn assemble_input(&self, target_id: &str) -> Value {
        let Some(entry) = self.fan_in.get(target_id) else {
            return Value::Object(Map::new());
        };
        if let Some(node) = self.graph.node(target_id) {
            if node.kind == "merge" {
                let strategy = MergeStrategy::from_node(node);
                let score_field = node.config.get("scoreField").and_then(Value::as_str);
                return build_merge_input(strategy, score_field, &entry.contributions);
            }
        }
        match entry.contributions.len() {
            0 => Value::Object(Map::new()),
            1 => entry.contributions[0].output.clone(),
            _ => Value::Array(entry.contributions.iter().map(|c| c.output.clone()).collect()),
        }
    }

    fn apply_side_channels(&mut self, output: &Value) {
        if let Some(set) = output.get("_setVariable").and_then(Value::as_object) {
            if let (Some(name), Some(value)) = (set.get("name").and_then(Value::as_str), set.get("value")) {
                self.record.context.set_variable(name.to_string(), value.clone());
            }
        }
        if let Some(fragments) = output.get("_appendContent").and_then(Value::as_array) {
            for fragment in fragments {
                if let Some(text) = fragment.as_str() {
                    self.record.context.push_content(text.to_string());
                }
            }
        }
    }

    async fn on_node_finished(&mut self, node_id: &str) {
        self.completed_count += 1;
        let total = self.graph.node_count().max(1);
        let progress = (self.completed_count as f64 / total as f64).min(1.0);
        self.observer.on_progress(progress, total, self.completed_count).await;

        let mut to_requeue = Vec::new();
        for (loop_id, state) in self.active_loops.iter_mut() {
            if state.remaining_leaves.remove(node_id) && state.remaining_leaves.is_empty() {
                to_requeue.push(loop_id.clone());
            }
        }
        for loop_id in to_requeue {
            self.ready.push_back((loop_id, Value::Object(Map::new())));
        }
    }

    async fn finalize_completed(&mut self) -> SchedulerOutcome {
        self.record.status = ExecutionStatus::Completed;
        self.record.ended_at = Some(chrono::Utc::now());
        self.record.current_node = None;
        self.observer.on_execution_complete(&self.record).await;
        SchedulerOutcome::Completed
    }

    async fn finalize_failed(&mut self, err: ExecutionError) -> SchedulerOutcome {
        self.record.status = ExecutionStatus::Failed;
        self.record.ended_at = Some(chrono::Utc::now());
        self.record.error = Some(err.clone());
        self.observer.on_execution_complete(&self.record).await;
        SchedulerOutcome::Failed(err)
    }

    async fn finalize_cancelled(&mut self) -> SchedulerOutcome {
        let err = ExecutionError::new(ErrorKind::Cancelled, "execution cancelled", self.record.current_node.clone());
        self.record.status = ExecutionStatus::Failed;
        self.record.ended_at = Some(chrono::Utc::now());
        self.record.error = Some(err);
        self.observer.on_execution_complete(&self.record).await;
        SchedulerOutcome::Cancelled
    }

    fn finalize_paused(&mut self) -> SchedulerOutcome {
        self.record.status = ExecutionStatus::Paused;
        SchedulerOutcome::Paused
    }

    fn finalize_awaiting(&mut self, node_id: String) -> SchedulerOutcome {
        self.record.status = ExecutionStatus::AwaitingInput;
        self.record.current_node = Some(node_id.clone());
        SchedulerOutcome::AwaitingInput { node_id }
    }
}

fn node_timeout(node: &Node) -> Option<Duration> {
    node.config.get("timeoutMs").and_then(Value::as_u64).map(Duration::from_millis)
}

/// Default 5, matching the runner library's own default — the scheduler's
/// hard ceiling on `loop` re-entry, independent of what the runner reports.
fn loop_max_iterations(node: &Node) -> u64 {
    node.config.get("maxIterations").and_then(Value::as_u64).unwrap_or(5)
}

/// Computes every `loop` node's body subgraph up front, once, via
/// `reachable_from`/`leaves_of` — the same traversal `route_loop` would
/// otherwise repeat on every iteration.
fn precompute_loop_bodies(graph: &GraphIndex) -> HashMap<String, HashSet<String>> {
    let mut bodies = HashMap::new();
    for node_id in graph.node_ids() {
        let Some(node) = graph.node(node_id) else { continue };
        if node.kind != "loop" {
            continue;
        }
        let body_edge = graph.outgoing(node_id).iter().find(|e| e.source_port.as_deref() != Some(PORT_CONTINUE));
        if let Some(body_edge) = body_edge {
            bodies.insert(node_id.to_string(), graph.reachable_from(&body_edge.target, node_id));
        }
    }
    bodies
}
