//! Stateless relay between the generation client and the chat-completion provider.
//!
//! One request in, one upstream call out:
//! - validate the prompt (no upstream call when it is blank)
//! - assemble the `[system, user]` conversation
//! - forward it with fixed sampling parameters and streaming enabled
//! - hand the provider's body back untouched

pub mod error;
pub mod messages;
pub mod upstream;

pub use error::RelayError;
pub use messages::{
    ChatCompletionRequest, ChatMessage, ChatRole, GenerateRequest, REVISION_MARKER, SYSTEM_PROMPT,
    build_messages,
};
pub use upstream::{ByteStream, CompletionUpstream, OpenRouterUpstream};

use std::sync::Arc;

use crate::config::RelayConfig;

/// The relay service. Holds no per-request state.
#[derive(Clone)]
pub struct Relay {
    upstream: Arc<dyn CompletionUpstream>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Relay {
    /// Create a relay over any upstream.
    #[must_use]
    pub fn new(upstream: Arc<dyn CompletionUpstream>, config: &RelayConfig) -> Self {
        Self {
            upstream,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Create a relay talking to the configured HTTPS provider.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let upstream = OpenRouterUpstream::new(config)?;
        Ok(Self::new(Arc::new(upstream), config))
    }

    /// The upstream body for a request, without sending it.
    ///
    /// # Errors
    /// Returns [`RelayError::MissingPrompt`] when the prompt is blank.
    pub fn completion_request(&self, request: &GenerateRequest) -> Result<ChatCompletionRequest, RelayError> {
        let prompt = request.validated_prompt()?;
        Ok(ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(prompt, request.current_html.as_deref()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        })
    }

    /// Relay one generation request and return the provider's raw event stream.
    ///
    /// # Errors
    /// Returns [`RelayError::MissingPrompt`] without contacting the provider, or
    /// [`RelayError::UpstreamFailure`] if the provider call fails. Never retries.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<ByteStream, RelayError> {
        let completion = self.completion_request(request)?;
        tracing::info!(
            model = %completion.model,
            prompt_chars = request.prompt.as_deref().map_or(0, |p| p.chars().count()),
            user_bytes = completion.messages[1].content.len(),
            revision = request.current_html.as_deref().is_some_and(|html| !html.is_empty()),
            "Relaying generation request"
        );
        self.upstream.send(&completion).await
    }
}
