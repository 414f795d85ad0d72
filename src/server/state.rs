//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::relay::{Relay, RelayError};

/// Shared application state.
pub struct AppState {
    /// Relay to the chat-completion provider.
    pub relay: Relay,
}

impl AppState {
    /// Create state over an existing relay.
    #[must_use]
    pub fn new(relay: Relay) -> Arc<Self> {
        Arc::new(Self { relay })
    }

    /// Create state from configuration.
    ///
    /// # Errors
    /// Returns an error if the upstream HTTP client cannot be created.
    pub fn from_config(config: &RelayConfig) -> Result<Arc<Self>, RelayError> {
        let relay = Relay::from_config(config)?;
        tracing::info!(model = %config.model, api_url = %config.api_url, "Relay configured");
        Ok(Self::new(relay))
    }
}
