//! A deterministic, non-networked [`AiClient`] the server ships so the
//! whole graph can be exercised without a live model collaborator behind
//! it. Every call derives its output from the prompt text alone, so the
//! same prompt always produces the same answer.

use async_trait::async_trait;
use elpa_runners::{AiClient, RunnerError, TextChunk};
use futures::stream::{self, BoxStream};
use serde_json::{json, Value};

pub struct StubAiClient;

impl StubAiClient {
    fn respond_to(prompt: &str) -> String {
        format!("[stub response to a {}-character prompt]", prompt.len())
    }
}

#[async_trait]
impl AiClient for StubAiClient {
    async fn generate_text_completion(&self, prompt: &str) -> Result<String, RunnerError> {
        Ok(Self::respond_to(prompt))
    }

    async fn stream_text_completion(&self, prompt: &str) -> Result<BoxStream<'static, TextChunk>, RunnerError> {
        let words: Vec<String> = Self::respond_to(prompt)
            .split(' ')
            .map(|w| format!("{w} "))
            .collect();
        let chunks: Vec<TextChunk> = words.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn generate_structured_output(&self, prompt: &str, schema: &Value) -> Result<Value, RunnerError> {
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Ok(json!({ "summary": Self::respond_to(prompt) }));
        };
        let mut out = serde_json::Map::new();
        for (key, field) in properties {
            let value = match field.get("type").and_then(Value::as_str) {
                Some("number") | Some("integer") => json!(0),
                Some("boolean") => json!(false),
                Some("array") => json!([]),
                Some("object") => json!({}),
                _ => json!(Self::respond_to(&format!("{prompt}:{key}"))),
            };
            out.insert(key.clone(), value);
        }
        Ok(Value::Object(out))
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_prompt_yields_same_completion() {
        let ai = StubAiClient;
        let a = ai.generate_text_completion("tell me about fish").await.unwrap();
        let b = ai.generate_text_completion("tell me about fish").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn structured_output_fills_every_declared_property() {
        let ai = StubAiClient;
        let schema = json!({
            "properties": {
                "score": { "type": "number" },
                "label": { "type": "string" },
                "correct": { "type": "boolean" },
            }
        });
        let out = ai.generate_structured_output("grade this", &schema).await.unwrap();
        assert!(out.get("score").unwrap().is_number());
        assert!(out.get("label").unwrap().is_string());
        assert_eq!(out.get("correct").unwrap(), &json!(false));
    }

    #[tokio::test]
    async fn stream_completion_yields_at_least_one_chunk() {
        let ai = StubAiClient;
        let mut stream = ai.stream_text_completion("hello there").await.unwrap();
        use futures::StreamExt;
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }
        assert!(!chunks.is_empty());
    }
}
