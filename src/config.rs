//! Configuration for the relay server and the generation client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default chat-completion endpoint.
pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
/// Default model identifier sent upstream.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-pro";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default output-token ceiling, large enough for a full HTML document.
pub const DEFAULT_MAX_TOKENS: u32 = 16_384;
/// Default relay port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default relay endpoint used by the generation client.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000/generate";

const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
const API_URL_ENV: &str = "SARK_API_URL";
const MODEL_ENV: &str = "SARK_MODEL";
const PORT_ENV: &str = "SARK_PORT";
const READ_TIMEOUT_ENV: &str = "SARK_READ_TIMEOUT_SECS";
const RELAY_URL_ENV: &str = "SARK_RELAY_URL";
const CLIENT_TIMEOUT_ENV: &str = "SARK_CLIENT_TIMEOUT_SECS";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
    /// A value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// URL parsing error.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Relay server configuration. The API key never leaves the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Upstream chat-completion endpoint.
    pub api_url: String,
    /// Bearer credential for the upstream provider.
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output-token ceiling.
    pub max_tokens: u32,
    /// Listening port.
    pub port: u16,
    /// Longest silence tolerated between two upstream body chunks. A
    /// generation may stream for as long as the provider keeps sending.
    #[serde(with = "duration_serde")]
    pub read_timeout: Duration,
    /// Upstream connect timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            port: DEFAULT_PORT,
            read_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RelayConfig {
    /// Build the configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or a value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or a value fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup(API_KEY_ENV).ok_or(ConfigError::MissingEnv(API_KEY_ENV))?;
        let mut config = Self::default().with_api_key(api_key);

        if let Some(api_url) = lookup(API_URL_ENV) {
            config = config.with_api_url(api_url);
        }
        if let Some(model) = lookup(MODEL_ENV) {
            config = config.with_model(model);
        }
        if let Some(port) = lookup(PORT_ENV).and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(secs) = env_secs(&lookup, READ_TIMEOUT_ENV) {
            config = config.with_read_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any value is out of range or malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("api_key must not be empty".to_string()));
        }
        Url::parse(&self.api_url)?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be > 0".to_string()));
        }
        Ok(())
    }

    /// Set the upstream credential.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Set the upstream endpoint.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the idle timeout between upstream body chunks.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Generation client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Relay endpoint (`POST /generate`).
    pub relay_url: String,
    /// Overall time allowed for one generation attempt.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Receive-stage progress added per streamed fragment.
    pub receive_step: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            request_timeout: Duration::from_secs(120),
            receive_step: 10,
        }
    }
}

impl ClientConfig {
    /// Build the configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if the relay URL is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    ///
    /// # Errors
    /// Returns an error if the relay URL is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(relay_url) = lookup(RELAY_URL_ENV) {
            config = config.with_relay_url(relay_url);
        }
        if let Some(secs) = env_secs(&lookup, CLIENT_TIMEOUT_ENV) {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Url::parse(&config.relay_url)?;
        Ok(config)
    }

    /// Set the relay endpoint.
    #[must_use]
    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    /// Set the attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn env_secs(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    lookup(name).and_then(|v| v.parse().ok())
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
