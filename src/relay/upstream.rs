//! Upstream chat-completion provider.

use std::pin::Pin;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::config::RelayConfig;

use super::error::RelayError;
use super::messages::ChatCompletionRequest;

/// Raw response body relayed to the caller untouched.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>;

/// A provider that accepts a chat-completion request and returns its raw body.
#[async_trait]
pub trait CompletionUpstream: Send + Sync {
    /// Issue one request. Non-success statuses must come back as
    /// [`RelayError::UpstreamFailure`] carrying the provider's status and body.
    async fn send(&self, request: &ChatCompletionRequest) -> Result<ByteStream, RelayError>;
}

/// OpenAI-compatible provider reached over HTTPS with a bearer credential.
pub struct OpenRouterUpstream {
    client: reqwest::Client,
    api_url: String,
}

impl OpenRouterUpstream {
    /// Create a client for the configured endpoint.
    ///
    /// # Errors
    /// Returns an error if the credential is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| RelayError::InternalFault(format!("Invalid API key header: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .read_timeout(config.read_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RelayError::InternalFault(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }
}

#[async_trait]
impl CompletionUpstream for OpenRouterUpstream {
    async fn send(&self, request: &ChatCompletionRequest) -> Result<ByteStream, RelayError> {
        let response = self.client.post(&self.api_url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("failed to read error body: {e}"));
            tracing::error!(%status, "Upstream API error: {error_text}");
            return Err(RelayError::upstream_status(status, &error_text));
        }

        Ok(Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(RelayError::from))))
    }
}
