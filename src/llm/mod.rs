//! Streaming chat-completion client
//!
//! Talks to an OpenAI-compatible `chat/completions` endpoint (Cerebras by
//! default) over SSE and yields raw content deltas. Hidden-region filtering
//! happens downstream in the engine.

pub mod sse;

use std::pin::Pin;

use futures::{Stream, StreamExt, stream};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::history::Message;
use crate::{Error, Result};
use sse::SseData;

/// Generation parameters, frozen per session at creation time
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub max_completion_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl From<&LlmConfig> for GenerationParams {
    fn from(llm: &LlmConfig) -> Self {
        Self {
            model: llm.model.clone(),
            max_completion_tokens: llm.max_tokens,
            temperature: llm.temperature,
            top_p: llm.top_p,
        }
    }
}

/// One `{role, content}` pair as sent to the model
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.clone(),
        }
    }
}

/// Chat completion request body
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    stream: bool,
    max_completion_tokens: u32,
    temperature: f64,
    top_p: f64,
}

/// One streamed completion chunk
#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// A stream of raw content deltas from one generation
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Client for an OpenAI-compatible completion endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    /// Create a client for the given endpoint
    #[must_use]
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Open a streaming completion call and return the content deltas.
    ///
    /// Dropping the returned stream releases the underlying connection, so
    /// cancellation mid-stream needs no extra cleanup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the call fails to open or the server
    /// rejects it; individual items are [`Error::Stream`] when the
    /// connection fails mid-generation.
    pub async fn stream_completion(
        &self,
        messages: &[WireMessage],
        params: &GenerationParams,
    ) -> Result<DeltaStream> {
        let request = ChatRequest {
            model: &params.model,
            messages,
            stream: true,
            max_completion_tokens: params.max_completion_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %params.model, messages = messages.len(), "opening completion stream");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Transport(format!("completion request timed out: {e}"))
                } else if e.is_connect() {
                    Error::Transport(format!("connection failed: {e}"))
                } else {
                    Error::Transport(format!("completion request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("completion API error {status}: {body}")));
        }

        Ok(delta_stream(response.bytes_stream()))
    }
}

/// Turn the SSE byte stream into a stream of non-empty content deltas
fn delta_stream<S>(byte_stream: S) -> DeltaStream
where
    S: Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
{
    let byte_stream = byte_stream.map(|chunk| {
        chunk.map_err(|e| Error::Stream(format!("error in completion stream: {e}")))
    });

    let stream = stream::unfold(
        (Box::pin(byte_stream), String::new(), false),
        |(mut bytes, mut buffer, mut done)| async move {
            loop {
                if done {
                    return None;
                }

                // Drain complete frames before reading more bytes
                if let Some((data, rest)) = sse::extract_frame(&buffer) {
                    buffer = rest;
                    match data {
                        SseData::Done => return None,
                        SseData::Empty => continue,
                        SseData::Data(json) => match serde_json::from_str::<ChatChunk>(&json) {
                            Ok(chunk) => {
                                let piece = chunk
                                    .choices
                                    .into_iter()
                                    .next()
                                    .and_then(|c| c.delta.content)
                                    .unwrap_or_default();
                                if piece.is_empty() {
                                    continue;
                                }
                                return Some((Ok(piece), (bytes, buffer, done)));
                            }
                            Err(e) => {
                                return Some((
                                    Err(Error::Stream(format!("malformed stream chunk: {e}"))),
                                    (bytes, buffer, done),
                                ));
                            }
                        },
                    }
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => match std::str::from_utf8(&chunk) {
                        Ok(text) => buffer.push_str(text),
                        Err(e) => {
                            done = true;
                            return Some((
                                Err(Error::Stream(format!("invalid UTF-8 in stream: {e}"))),
                                (bytes, buffer, done),
                            ));
                        }
                    },
                    Some(Err(e)) => {
                        done = true;
                        return Some((Err(e), (bytes, buffer, done)));
                    }
                    None => return None,
                }
            }
        },
    );

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_serializes_role_and_content() {
        let message = Message::user("What is photosynthesis?");
        let wire = WireMessage::from(&message);
        let json = serde_json::to_string(&wire).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"What is photosynthesis?"}"#);
    }

    #[test]
    fn request_body_carries_generation_parameters() {
        let messages = vec![WireMessage { role: "user", content: "hi".to_string() }];
        let request = ChatRequest {
            model: "qwen-3-32b",
            messages: &messages,
            stream: true,
            max_completion_tokens: 40_960,
            temperature: 0.6,
            top_p: 0.95,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "qwen-3-32b");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_completion_tokens"], 40_960);
    }

    #[test]
    fn chunk_parsing_tolerates_missing_fields() {
        let chunk: ChatChunk = serde_json::from_str(r#"{"choices":[{"delta":{}}]}"#).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());

        let empty: ChatChunk = serde_json::from_str(r"{}").unwrap();
        assert!(empty.choices.is_empty());
    }

    #[tokio::test]
    async fn delta_stream_yields_content_in_order() {
        let frames = [
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let bytes = stream::iter(
            frames
                .iter()
                .map(|f| Ok(bytes::Bytes::from_static(f.as_bytes())))
                .collect::<Vec<std::result::Result<bytes::Bytes, reqwest::Error>>>(),
        );

        let deltas: Vec<String> = delta_stream(bytes)
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(deltas, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn delta_stream_handles_frames_split_across_chunks() {
        let parts = [
            "data: {\"choices\":[{\"del",
            "ta\":{\"content\":\"ok\"}}]}\n",
            "\ndata: [DONE]\n\n",
        ];
        let bytes = stream::iter(
            parts
                .iter()
                .map(|f| Ok(bytes::Bytes::from_static(f.as_bytes())))
                .collect::<Vec<std::result::Result<bytes::Bytes, reqwest::Error>>>(),
        );

        let deltas: Vec<String> = delta_stream(bytes)
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(deltas, vec!["ok"]);
    }
}
