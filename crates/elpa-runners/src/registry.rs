//! The node-runner registry: maps a resolved [`NodeKind`] onto an
//! implementation, and lets the scheduler resolve an unknown kind to
//! nothing (a skip, not a failure).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use elpa_core::{ExecutionContext, Node};
use serde_json::Value;

use crate::error::Result;
use crate::kind::NodeKind;

/// What a runner hands back to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct RunnerOutput {
    pub output: Value,
    pub should_pause: bool,
    pub streamed: bool,
}

impl RunnerOutput {
    pub fn new(output: Value) -> Self {
        Self {
            output,
            should_pause: false,
            streamed: false,
        }
    }

    pub fn pausing(output: Value) -> Self {
        Self {
            output,
            should_pause: true,
            streamed: false,
        }
    }
}

/// A pure function `(node, input, context) -> Result`. Implementations must
/// not touch the stream manager directly — only the scheduler translates a
/// runner's return value into stream events.
#[async_trait]
pub trait NodeRunner: Send + Sync {
    async fn run(
        &self,
        node: &Node,
        input: Value,
        context: &ExecutionContext,
    ) -> Result<RunnerOutput>;
}

/// Dispatch table from [`NodeKind`] to its runner implementation.
#[derive(Default, Clone)]
pub struct NodeRunnerRegistry {
    runners: HashMap<String, Arc<dyn NodeRunner>>,
}

impl NodeRunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: NodeKind, runner: Arc<dyn NodeRunner>) {
        self.runners.insert(kind.to_string(), runner);
    }

    /// Resolve a runner for the node's wire-format type string. Returns
    /// `None` for both genuinely unknown kinds and [`NodeKind::Unknown`] —
    /// the caller treats both identically as a skip.
    pub fn get(&self, kind_str: &str) -> Option<&Arc<dyn NodeRunner>> {
        self.runners.get(kind_str)
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}
