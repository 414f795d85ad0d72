//! Pluggable transports that turn a prompt into a stream of document text.
//!
//! Two interchangeable implementations, chosen when the client is built:
//! - [`RelayTransport`]: `POST /generate` on the relay, decoding its event stream
//! - [`CompletionTransport`]: one non-streaming chat-completion call, the whole
//!   document arriving as a single fragment

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{ClientConfig, RelayConfig};
use crate::relay::{ChatCompletionRequest, GenerateRequest, build_messages};

use super::error::{ClientError, ClientResult};
use super::sse::{ParseResult, SseParser};

/// Fragments of generated text, in order.
pub type TextStream = Pin<Box<dyn Stream<Item = ClientResult<String>> + Send>>;

/// What the client asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Natural-language description.
    pub prompt: String,
    /// Document to revise, supplied verbatim.
    pub prior_document: Option<String>,
}

impl GenerationRequest {
    /// Request body for the relay.
    #[must_use]
    pub fn to_wire(&self) -> GenerateRequest {
        GenerateRequest {
            prompt: Some(self.prompt.clone()),
            current_html: self.prior_document.clone(),
        }
    }
}

/// Sends a generation request and yields the response text.
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// Dispatch the request. Returns once the provider has accepted it; the
    /// text is read from the returned stream.
    async fn submit(&self, request: &GenerationRequest) -> ClientResult<TextStream>;
}

/// Transport through the relay service, with true streaming.
pub struct RelayTransport {
    client: reqwest::Client,
    relay_url: String,
}

impl RelayTransport {
    /// Create a transport for the configured relay.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: config.relay_url.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[async_trait]
impl GenerationTransport for RelayTransport {
    async fn submit(&self, request: &GenerationRequest) -> ClientResult<TextStream> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(&request.to_wire())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body).map_or(body, |parsed| parsed.error);
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        Ok(decode_event_stream(response.bytes_stream()))
    }
}

/// Decode a chat-completion event stream into text fragments.
pub fn decode_event_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    let decoder = EventDecoder {
        bytes: Box::pin(bytes),
        parser: SseParser::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    Box::pin(stream::unfold(decoder, |mut decoder| async move {
        decoder.next_fragment().await.map(|item| (item, decoder))
    }))
}

struct EventDecoder<S> {
    bytes: Pin<Box<S>>,
    parser: SseParser,
    pending: VecDeque<ParseResult>,
    finished: bool,
}

impl<S, B, E> EventDecoder<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    async fn next_fragment(&mut self) -> Option<ClientResult<String>> {
        loop {
            while let Some(result) = self.pending.pop_front() {
                match result {
                    ParseResult::Delta(text) => return Some(Ok(text)),
                    ParseResult::Done => {
                        self.finished = true;
                        self.pending.clear();
                        return None;
                    }
                    ParseResult::Error(message) => {
                        self.finished = true;
                        self.pending.clear();
                        return Some(Err(ClientError::Upstream { status: 502, message }));
                    }
                    ParseResult::Ignored => {}
                }
            }
            if self.finished {
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    let results = self.parser.feed_bytes(chunk.as_ref());
                    self.pending.extend(results);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    self.pending.extend(self.parser.finish());
                }
            }
        }
    }
}

/// Transport calling a chat-completion endpoint directly, without streaming.
pub struct CompletionTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl CompletionTransport {
    /// Create a transport from relay-style provider settings.
    #[must_use]
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Single materialized completion for a conversation.
    async fn generate_text(&self, request: &ChatCompletionRequest) -> ClientResult<String> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }

        let json: Value = response.json().await?;
        json.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Malformed("completion has no message content".to_string()))
    }
}

#[async_trait]
impl GenerationTransport for CompletionTransport {
    async fn submit(&self, request: &GenerationRequest) -> ClientResult<TextStream> {
        let completion = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(&request.prompt, request.prior_document.as_deref()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };
        let text = self.generate_text(&completion).await?;
        Ok(Box::pin(stream::once(async move { Ok(text) })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
        )
    }

    async fn collect(stream: TextStream) -> Vec<ClientResult<String>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_decode_concatenates_deltas_until_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", frame("<html>"), frame("</html>"), frame("ignored"));
        let (head, tail) = body.split_at(7);
        let chunks: Vec<Result<Vec<u8>, ClientError>> =
            vec![Ok(head.as_bytes().to_vec()), Ok(tail.as_bytes().to_vec())];

        let fragments = collect(decode_event_stream(stream::iter(chunks))).await;
        let text: String = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(text, "<html></html>");
    }

    #[tokio::test]
    async fn test_decode_surfaces_in_stream_error() {
        let body = format!("{}data: {{\"error\":{{\"message\":\"overloaded\"}}}}\n\n", frame("<html>"));
        let chunks: Vec<Result<Vec<u8>, ClientError>> = vec![Ok(body.into_bytes())];

        let fragments = collect(decode_event_stream(stream::iter(chunks))).await;
        assert_eq!(fragments.len(), 2);
        assert!(matches!(
            &fragments[1],
            Err(ClientError::Upstream { status: 502, message }) if message == "overloaded"
        ));
    }

    #[tokio::test]
    async fn test_decode_without_done_marker() {
        let chunks: Vec<Result<Vec<u8>, ClientError>> = vec![Ok(frame("<html></html>").into_bytes())];
        let fragments = collect(decode_event_stream(stream::iter(chunks))).await;
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn test_wire_request() {
        let request = GenerationRequest {
            prompt: "Add a menu".to_string(),
            prior_document: Some("<html></html>".to_string()),
        };
        let json = serde_json::to_value(request.to_wire()).unwrap();
        assert_eq!(json["prompt"], "Add a menu");
        assert_eq!(json["currentHtml"], "<html></html>");
    }
}
