//! External text-generation service.
//!
//! The orchestrator talks to the service through `GenerationService`; the
//! concrete client speaks the Ollama HTTP API.

pub mod ollama;

use aerochat_core::types::Turn;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::error::ChatError;
pub use ollama::OllamaClient;

/// Incrementally arriving content fragments, terminated by end of stream.
pub type FragmentStream<'a> = BoxStream<'a, Result<String, ChatError>>;

/// A chat request: model, ordered turns, and whether to stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub stream: bool,
}

impl GenerationRequest {
    pub fn streaming(model: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }

    pub fn single(model: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
        }
    }
}

/// Chat-capable generation backend. Safe to share across sessions.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Complete a request and return the whole answer at once.
    async fn chat(&self, request: GenerationRequest) -> Result<String, ChatError>;

    /// Start a streamed completion. Dropping the stream abandons the request.
    fn chat_stream(&self, request: GenerationRequest) -> FragmentStream<'_>;

    /// Names of the models the service can run.
    async fn list_models(&self) -> Result<Vec<String>, ChatError>;

    /// Load `model` ahead of the first real request.
    async fn warm_up(&self, model: &str) -> Result<(), ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = GenerationRequest::streaming(
            "llama3",
            vec![Turn::system("be brief"), Turn::user("hi")],
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "llama3",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn test_single_request_not_streamed() {
        let request = GenerationRequest::single("m", vec![]);
        assert!(!request.stream);
    }
}
