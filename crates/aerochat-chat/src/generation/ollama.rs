//! Ollama chat client

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{FragmentStream, GenerationRequest, GenerationService};
use crate::error::ChatError;

/// HTTP client for an Ollama-compatible generation service.
///
/// Streamed answers have no overall deadline. `timeout` bounds the connect,
/// the wait for response headers and the gap between two body chunks.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "HTTP client builder failed, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn error_from(response: reqwest::Response) -> ChatError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        ChatError::Generation(format!("Ollama API error ({}): {}", status, error_text))
    }
}

#[async_trait]
impl GenerationService for OllamaClient {
    async fn chat(&self, request: GenerationRequest) -> Result<String, ChatError> {
        let request = GenerationRequest {
            stream: false,
            ..request
        };
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Generation(format!("Failed to parse response: {}", e)))?;
        Ok(body.message.content)
    }

    fn chat_stream(&self, request: GenerationRequest) -> FragmentStream<'_> {
        let request = GenerationRequest {
            stream: true,
            ..request
        };
        let url = format!("{}/api/chat", self.base_url);
        let client = self.client.clone();
        let idle = self.timeout;

        Box::pin(stream! {
            let send = client.post(&url).json(&request).send();
            let response = match timeout(idle, send).await {
                Ok(Ok(res)) if res.status().is_success() => res,
                Ok(Ok(res)) => {
                    yield Err(Self::error_from(res).await);
                    return;
                }
                Ok(Err(e)) => {
                    yield Err(ChatError::from(e));
                    return;
                }
                Err(_) => {
                    yield Err(ChatError::Generation(format!(
                        "no response within {:?}",
                        idle
                    )));
                    return;
                }
            };

            let mut body = response.bytes_stream();
            // Raw bytes: a chunk may end inside a multi-byte character.
            let mut buffer: Vec<u8> = Vec::new();
            let mut done = false;

            'read: loop {
                let bytes = match timeout(idle, body.next()).await {
                    Ok(Some(Ok(bytes))) => bytes,
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        yield Err(ChatError::from(e));
                        return;
                    }
                    Err(_) => {
                        yield Err(ChatError::Generation(format!(
                            "stream stalled for {:?}",
                            idle
                        )));
                        return;
                    }
                };
                buffer.extend_from_slice(&bytes);

                // Process complete lines (NDJSON format)
                while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=line_end).collect();
                    match decode_line(&line).and_then(parse_stream_line) {
                        Ok(StreamLine::Fragment(text)) => yield Ok(text),
                        Ok(StreamLine::Skip) => {}
                        Ok(StreamLine::Done) => {
                            done = true;
                            break 'read;
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            // A final line without a trailing newline.
            if !done {
                match decode_line(&buffer).and_then(parse_stream_line) {
                    Ok(StreamLine::Fragment(text)) => yield Ok(text),
                    Ok(_) => {}
                    Err(e) => yield Err(e),
                }
            }
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let tags: OllamaTags = response
            .json()
            .await
            .map_err(|e| ChatError::Generation(format!("Failed to parse model list: {}", e)))?;
        debug!(count = tags.models.len(), "Listed models");
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn warm_up(&self, model: &str) -> Result<(), ChatError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": model,
                "prompt": "",
                "stream": false,
            }))
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        info!(model, "Model warmed up");
        Ok(())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Debug, PartialEq)]
enum StreamLine {
    Fragment(String),
    Skip,
    Done,
}

fn decode_line(line: &[u8]) -> Result<&str, ChatError> {
    std::str::from_utf8(line)
        .map_err(|e| ChatError::Generation(format!("Stream is not valid UTF-8: {}", e)))
}

fn parse_stream_line(line: &str) -> Result<StreamLine, ChatError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(StreamLine::Skip);
    }
    let parsed: OllamaStreamResponse = serde_json::from_str(line)
        .map_err(|e| ChatError::Generation(format!("Failed to parse stream: {}", e)))?;
    if let Some(error) = parsed.error {
        return Err(ChatError::Generation(error));
    }
    let content = parsed.message.map(|m| m.content).unwrap_or_default();
    if !content.is_empty() {
        // Ollama puts no content in its final line, but keep it if present.
        return Ok(StreamLine::Fragment(content));
    }
    if parsed.done {
        Ok(StreamLine::Done)
    } else {
        Ok(StreamLine::Skip)
    }
}
