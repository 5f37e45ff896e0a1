//! The execution façade: the single entry point `elpa-server` drives.
//! Owns in-flight runs so a paused or awaiting-input execution can be
//! resumed by id later, and translates [`SchedulerOutcome`] into the
//! wire-level shapes the HTTP layer needs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use elpa_core::{ExecutionContext, GraphIndex, ValidationIssue, Workflow, WorkflowExecutionRecord};
use elpa_runners::NodeRunnerRegistry;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::control::ExecutionControl;
use crate::error::{EngineError, Result};
use crate::merge::MergeStrategy;
use crate::observer::{ExecutionObserver, NoopObserver};
use crate::scheduler::{Scheduler, SchedulerOutcome};

/// Validates workflow-wide invariants the graph index itself doesn't know
/// about — currently, that every `select-best` merge node declares
/// `config.scoreField`.
pub fn validate_merge_strategies(workflow: &Workflow) -> Vec<ValidationIssue> {
    workflow
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.kind == "merge")
        .filter_map(|(i, n)| MergeStrategy::validate(n, &format!("nodes[{i}]")))
        .collect()
}

/// Runs workflows to completion (or suspension) and keeps the suspended
/// ones around for [`ExecutionFacade::resume`]/[`ExecutionFacade::pause`].
pub struct ExecutionFacade {
    registry: Arc<NodeRunnerRegistry>,
    observer: Arc<dyn ExecutionObserver>,
    node_timeout: Option<Duration>,
    runs: Mutex<HashMap<String, Scheduler>>,
}

impl ExecutionFacade {
    pub fn new(registry: Arc<NodeRunnerRegistry>) -> Self {
        Self { registry, observer: Arc::new(NoopObserver), node_timeout: None, runs: Mutex::new(HashMap::new()) }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    /// Validates `workflow`, builds a fresh scheduler for `student`, and
    /// runs it until it completes, fails, pauses, or a node asks for human
    /// input. The run is kept keyed by its execution id whenever it
    /// doesn't finish outright, so a later `resume`/`pause`/`cancel` call
    /// can find it again.
    pub async fn execute(&self, workflow: &Workflow, context: ExecutionContext) -> Result<WorkflowExecutionRecord> {
        self.execute_with_control(workflow, context, ExecutionControl::new()).await
    }

    /// Same as [`ExecutionFacade::execute`], but takes the cancellation
    /// handle rather than creating one internally — lets a caller (e.g. a
    /// stream disconnect watcher) cancel a run that's still in progress,
    /// not only one already suspended in `self.runs`. A client disconnect
    /// mid-run cancels the scheduler immediately rather than waiting for
    /// its next suspend point.
    pub async fn execute_with_control(
        &self,
        workflow: &Workflow,
        context: ExecutionContext,
        control: ExecutionControl,
    ) -> Result<WorkflowExecutionRecord> {
        let execution_id = uuid::Uuid::new_v4().to_string();
        self.execute_as(workflow, context, execution_id, control).await
    }

    /// Same as [`ExecutionFacade::execute_with_control`], but with a
    /// caller-assigned execution id rather than a freshly generated one —
    /// lets the HTTP layer register the id (for a concurrent `/resume`
    /// call to find) before the run's first event is even emitted.
    pub async fn execute_as(
        &self,
        workflow: &Workflow,
        context: ExecutionContext,
        execution_id: String,
        control: ExecutionControl,
    ) -> Result<WorkflowExecutionRecord> {
        let mut issues = match GraphIndex::build(workflow) {
            Ok(_) => Vec::new(),
            Err(issues) => issues,
        };
        issues.extend(validate_merge_strategies(workflow));
        if !issues.is_empty() {
            return Err(EngineError::InvalidWorkflow(issues));
        }
        let graph = GraphIndex::build(workflow).expect("validated above");

        let record = WorkflowExecutionRecord::with_id(execution_id.clone(), workflow.id.clone(), context);
        let mut scheduler = Scheduler::new(graph, self.registry.clone(), self.observer.clone(), control, self.node_timeout, record);

        let outcome = scheduler.run().await;
        self.settle(execution_id, scheduler, outcome).await
    }

    /// Feeds a human's answer back into a run that's `AwaitingInput`.
    pub async fn resume(&self, execution_id: &str, human_input: Value) -> Result<WorkflowExecutionRecord> {
        let mut scheduler = self.take(execution_id).await?;
        let outcome = scheduler.resume_with_input(human_input).await;
        self.settle(execution_id.to_string(), scheduler, outcome).await
    }

    /// Signals a running execution to cancel. Best-effort: meaningful when
    /// a caller holds `execute`/`resume`'s future on another task, since
    /// this façade drives one run at a time to completion otherwise.
    pub async fn cancel(&self, execution_id: &str) -> bool {
        let runs = self.runs.lock().await;
        match runs.get(execution_id) {
            Some(scheduler) => {
                scheduler.control().cancel();
                true
            }
            None => false,
        }
    }

    /// Signals a running execution to pause at its next node boundary.
    pub async fn pause(&self, execution_id: &str) -> bool {
        let runs = self.runs.lock().await;
        match runs.get(execution_id) {
            Some(scheduler) => {
                scheduler.control().request_pause();
                true
            }
            None => false,
        }
    }

    pub async fn is_awaiting_input(&self, execution_id: &str) -> bool {
        let runs = self.runs.lock().await;
        matches!(runs.get(execution_id).map(|s| s.record().status), Some(elpa_core::ExecutionStatus::AwaitingInput))
    }

    /// The awaited node's identifier, if `execution_id` is currently
    /// `AwaitingInput`. `None` for any other status, including "no such
    /// execution" and "already resumed".
    pub async fn get_awaiting_input_node(&self, execution_id: &str) -> Option<String> {
        let runs = self.runs.lock().await;
        let scheduler = runs.get(execution_id)?;
        if scheduler.record().status != elpa_core::ExecutionStatus::AwaitingInput {
            return None;
        }
        scheduler.record().current_node.clone()
    }

    /// A snapshot of a still-suspended run's record, for a status poll
    /// that doesn't want to mutate anything. `None` once the run has
    /// settled to a terminal state and been handed back to its caller.
    pub async fn peek_record(&self, execution_id: &str) -> Option<WorkflowExecutionRecord> {
        let runs = self.runs.lock().await;
        runs.get(execution_id).map(|s| s.record().clone())
    }

    async fn take(&self, execution_id: &str) -> Result<Scheduler> {
        let mut runs = self.runs.lock().await;
        runs.remove(execution_id).ok_or_else(|| {
            EngineError::InvalidWorkflow(vec![ValidationIssue::new("executionId", format!("no suspended execution '{execution_id}'"))])
        })
    }

    /// Stashes the scheduler if its run isn't terminal yet, and returns the
    /// record either way.
    async fn settle(&self, execution_id: String, scheduler: Scheduler, outcome: SchedulerOutcome) -> Result<WorkflowExecutionRecord> {
        let suspended = matches!(outcome, SchedulerOutcome::Paused | SchedulerOutcome::AwaitingInput { .. });
        let record = scheduler.record().clone();
        if suspended {
            self.runs.lock().await.insert(execution_id, scheduler);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elpa_core::{Edge, Node, StudentProfile};
    use elpa_runners::{builtin_registry, RunnerError};

    struct NoopAi;
    #[async_trait::async_trait]
    impl elpa_runners::AiClient for NoopAi {
        async fn generate_text_completion(&self, _prompt: &str) -> std::result::Result<String, RunnerError> {
            Ok("ok".to_string())
        }
        async fn stream_text_completion(&self, _prompt: &str) -> std::result::Result<futures::stream::BoxStream<'static, elpa_runners::TextChunk>, RunnerError> {
            Ok(Box::pin(futures::stream::empty()))
        }
        async fn generate_structured_output(&self, _prompt: &str, _schema: &Value) -> std::result::Result<Value, RunnerError> {
            Ok(Value::Null)
        }
    }

    fn student() -> ExecutionContext {
        ExecutionContext::new(StudentProfile::new("s1", "3", 2))
    }

    #[tokio::test]
    async fn execute_rejects_select_best_without_score_field() {
        let mut wf = Workflow::new("wf1", "Bad merge");
        wf.nodes.push(Node::new("a", "student-profile"));
        let mut merge = Node::new("m", "merge");
        merge.config.insert("mergeStrategy".to_string(), serde_json::json!("select-best"));
        wf.nodes.push(merge);
        wf.edges.push(Edge::new("a", "m"));

        let facade = ExecutionFacade::new(Arc::new(builtin_registry(Arc::new(NoopAi))));
        let err = facade.execute(&wf, student()).await.unwrap_err();
        assert!(!err.issues().is_empty());
    }

    #[tokio::test]
    async fn execute_completes_trivially_for_an_empty_workflow() {
        let wf = Workflow::new("wf1", "Empty");

        let facade = ExecutionFacade::new(Arc::new(builtin_registry(Arc::new(NoopAi))));
        let record = facade.execute(&wf, student()).await.unwrap();
        assert_eq!(record.status, elpa_core::ExecutionStatus::Completed);
        assert!(record.node_executions.is_empty());
    }

    #[tokio::test]
    async fn execute_runs_a_celebration_workflow_to_completion() {
        let mut wf = Workflow::new("wf1", "Celebrate");
        wf.nodes.push(Node::new("a", "celebration"));

        let facade = ExecutionFacade::new(Arc::new(builtin_registry(Arc::new(NoopAi))));
        let record = facade.execute(&wf, student()).await.unwrap();
        assert_eq!(record.status, elpa_core::ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn execute_pauses_at_human_input_and_resume_continues() {
        let mut wf = Workflow::new("wf1", "Ask");
        wf.nodes.push(Node::new("ask", "human-input"));
        wf.nodes.push(Node::new("done", "celebration"));
        wf.edges.push(Edge::new("ask", "done"));

        let facade = ExecutionFacade::new(Arc::new(builtin_registry(Arc::new(NoopAi))));
        let record = facade.execute(&wf, student()).await.unwrap();
        assert_eq!(record.status, elpa_core::ExecutionStatus::AwaitingInput);

        let resumed = facade.resume(&record.id, serde_json::json!("my answer")).await.unwrap();
        assert_eq!(resumed.status, elpa_core::ExecutionStatus::Completed);
        let done = resumed.node_executions.iter().find(|r| r.node_id == "done").unwrap();
        assert_eq!(done.input.get("userAnswer"), Some(&serde_json::json!("my answer")));
    }

    #[tokio::test]
    async fn get_awaiting_input_node_reports_the_paused_node() {
        let mut wf = Workflow::new("wf1", "Ask");
        wf.nodes.push(Node::new("ask", "human-input"));

        let facade = ExecutionFacade::new(Arc::new(builtin_registry(Arc::new(NoopAi))));
        let record = facade.execute(&wf, student()).await.unwrap();

        assert!(facade.is_awaiting_input(&record.id).await);
        assert_eq!(facade.get_awaiting_input_node(&record.id).await.as_deref(), Some("ask"));

        facade.resume(&record.id, serde_json::json!("ok")).await.unwrap();
        assert_eq!(facade.get_awaiting_input_node(&record.id).await, None);
    }

    #[tokio::test]
    async fn execute_as_honours_the_caller_assigned_id() {
        let mut wf = Workflow::new("wf1", "Celebrate");
        wf.nodes.push(Node::new("a", "celebration"));

        let facade = ExecutionFacade::new(Arc::new(builtin_registry(Arc::new(NoopAi))));
        let record = facade.execute_as(&wf, student(), "fixed-id".to_string(), ExecutionControl::new()).await.unwrap();
        assert_eq!(record.id, "fixed-id");
    }

    #[tokio::test]
    async fn get_awaiting_input_node_is_none_without_an_active_pause() {
        let facade = ExecutionFacade::new(Arc::new(builtin_registry(Arc::new(NoopAi))));
        assert_eq!(facade.get_awaiting_input_node("no-such-execution").await, None);
    }
}
