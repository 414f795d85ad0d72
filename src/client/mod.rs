//! Generation client.
//!
//! This module provides everything the builder view needs:
//! - Transports to the relay (streamed) or a completion endpoint (single shot)
//! - The submit / receive / process stage machine
//! - The generated artifact with preview, download and clipboard helpers
//! - Observable auth and theme stores

pub mod artifact;
pub mod auth;
pub mod error;
pub mod pipeline;
pub mod sse;
pub mod stages;
pub mod store;
pub mod theme;
pub mod transport;

pub use artifact::{Artifact, Clipboard, Download, MemoryClipboard, PreviewFrame};
pub use auth::{AppView, AuthError, AuthSession, AuthState, IdentityProvider, User};
pub use error::{ClientError, ClientResult};
pub use pipeline::{ClientSnapshot, GenerationClient};
pub use stages::{Stage, StageError, StageId, StageStatus, StageTracker};
pub use store::{Store, Subscription};
pub use theme::Theme;
pub use transport::{CompletionTransport, GenerationRequest, GenerationTransport, RelayTransport, TextStream};
