//! The AI-collaborator contract node runners are built against.
//!
//! Mirrors a chat-model trait: a text-completion call, a streamed variant,
//! and a structured-output call against a caller-supplied JSON schema.
//! Runners hold a `dyn AiClient` rather than a concrete provider so the
//! engine can run against a deterministic stub in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::RunnerError;

/// One chunk of a streamed completion.
pub type TextChunk = std::result::Result<String, RunnerError>;

#[async_trait]
pub trait AiClient: Send + Sync {
    /// Produce a complete text response for `prompt`.
    async fn generate_text_completion(&self, prompt: &str) -> Result<String, RunnerError>;

    /// Produce a text response as a stream of chunks. The scheduler, not
    /// the runner, is responsible for turning these into stream events.
    async fn stream_text_completion(
        &self,
        prompt: &str,
    ) -> Result<BoxStream<'static, TextChunk>, RunnerError>;

    /// Produce a JSON value conforming to `schema`.
    async fn generate_structured_output(
        &self,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, RunnerError>;

    /// Whether the collaborator is reachable. Defaults to `true`; a
    /// provider-backed implementation overrides this with a health check.
    fn is_available(&self) -> bool {
        true
    }
}
