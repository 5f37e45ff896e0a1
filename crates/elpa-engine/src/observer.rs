//! The façade's callback surface: a single subscriber interface with
//! default no-op methods rather than a handful of optional function
//! fields, plus a closure-based adaptor for callers who'd rather pass
//! individual callbacks directly.

use async_trait::async_trait;
use elpa_core::{Node, WorkflowExecutionRecord};
use serde_json::Value;

#[async_trait]
pub trait ExecutionObserver: Send + Sync {
    async fn on_node_start(&self, _node_id: &str, _node: &Node) {}
    async fn on_node_complete(&self, _node_id: &str, _output: &Value) {}
    async fn on_node_error(&self, _node_id: &str, _message: &str) {}
    async fn on_progress(&self, _progress: f64, _total_nodes: usize, _completed_nodes: usize) {}
    async fn on_stream_token(&self, _node_id: &str, _content: &str) {}
    async fn on_execution_complete(&self, _record: &WorkflowExecutionRecord) {}
}

/// The façade's default observer: does nothing.
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

type NodeStartFn = Box<dyn Fn(&str, &Node) + Send + Sync>;
type NodeCompleteFn = Box<dyn Fn(&str, &Value) + Send + Sync>;
type NodeErrorFn = Box<dyn Fn(&str, &str) + Send + Sync>;
type ProgressFn = Box<dyn Fn(f64, usize, usize) + Send + Sync>;
type StreamTokenFn = Box<dyn Fn(&str, &str) + Send + Sync>;
type ExecutionCompleteFn = Box<dyn Fn(&WorkflowExecutionRecord) + Send + Sync>;

/// Adapts the spec's six-callback table onto [`ExecutionObserver`] for
/// callers who'd rather build up plain closures than implement a trait.
#[derive(Default)]
pub struct FnObserver {
    on_node_start: Option<NodeStartFn>,
    on_node_complete: Option<NodeCompleteFn>,
    on_node_error: Option<NodeErrorFn>,
    on_progress: Option<ProgressFn>,
    on_stream_token: Option<StreamTokenFn>,
    on_execution_complete: Option<ExecutionCompleteFn>,
}

impl FnObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_node_start(mut self, f: impl Fn(&str, &Node) + Send + Sync + 'static) -> Self {
        self.on_node_start = Some(Box::new(f));
        self
    }

    pub fn on_node_complete(mut self, f: impl Fn(&str, &Value) + Send + Sync + 'static) -> Self {
        self.on_node_complete = Some(Box::new(f));
        self
    }

    pub fn on_node_error(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_node_error = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(f64, usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_stream_token(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_stream_token = Some(Box::new(f));
        self
    }

    pub fn on_execution_complete(mut self, f: impl Fn(&WorkflowExecutionRecord) + Send + Sync + 'static) -> Self {
        self.on_execution_complete = Some(Box::new(f));
        self
    }
}

#[async_trait]
impl ExecutionObserver for FnObserver {
    async fn on_node_start(&self, node_id: &str, node: &Node) {
        if let Some(f) = &self.on_node_start {
            f(node_id, node);
        }
    }

    async fn on_node_complete(&self, node_id: &str, output: &Value) {
        if let Some(f) = &self.on_node_complete {
            f(node_id, output);
        }
    }

    async fn on_node_error(&self, node_id: &str, message: &str) {
        if let Some(f) = &self.on_node_error {
            f(node_id, message);
        }
    }

    async fn on_progress(&self, progress: f64, total_nodes: usize, completed_nodes: usize) {
        if let Some(f) = &self.on_progress {
            f(progress, total_nodes, completed_nodes);
        }
    }

    async fn on_stream_token(&self, node_id: &str, content: &str) {
        if let Some(f) = &self.on_stream_token {
            f(node_id, content);
        }
    }

    async fn on_execution_complete(&self, record: &WorkflowExecutionRecord) {
        if let Some(f) = &self.on_execution_complete {
            f(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elpa_core::{ExecutionContext, StudentProfile};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fn_observer_invokes_only_registered_callbacks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let observer = FnObserver::new().on_node_start(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        observer.on_node_start("n1", &Node::new("n1", "celebration")).await;
        observer.on_node_complete("n1", &Value::Null).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn noop_observer_never_panics() {
        let observer = NoopObserver;
        let record = WorkflowExecutionRecord::new("wf", ExecutionContext::new(StudentProfile::new("s1", "3", 2)));
        observer.on_node_start("n1", &Node::new("n1", "celebration")).await;
        observer.on_execution_complete(&record).await;
    }
}
