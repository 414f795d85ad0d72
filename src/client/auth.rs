//! Identity provider boundary, auth state and the views it selects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::store::{Store, Subscription};

/// Signed-in user as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Provider identifier.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Optional display name.
    pub display_name: Option<String>,
}

impl User {
    /// Name shown in the builder header: the display name, else the email's local part.
    #[must_use]
    pub fn username(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// Authentication state published by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    /// Current user, if signed in.
    pub user: Option<User>,
    /// Whether the provider is still resolving the session.
    pub is_loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading: true,
        }
    }
}

/// Top-level view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppView {
    /// Marketing page.
    Landing,
    /// Sign-in / sign-up forms.
    Auth,
    /// Prompt, progress, code and preview.
    Builder,
}

impl AppView {
    /// View after an auth change: the builder whenever a user is present,
    /// otherwise back to the landing page. `None` while the session is loading.
    #[must_use]
    pub fn for_auth_state(state: &AuthState) -> Option<Self> {
        if state.is_loading {
            return None;
        }
        Some(if state.user.is_some() { Self::Builder } else { Self::Landing })
    }
}

/// Provider failures. Each maps to one inline message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Sign-in rejected.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Sign-up confirmation does not match.
    #[error("Passwords do not match")]
    PasswordMismatch,
    /// Sign-up rejected.
    #[error("Registration failed")]
    RegistrationFailed,
    /// Federated login rejected.
    #[error("Google sign-in failed")]
    FederatedLoginFailed,
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in with email and password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, String>;
    /// Create an account.
    async fn sign_up(&self, email: &str, password: &str, username: &str) -> Result<User, String>;
    /// Federated login (e.g. `"google"`).
    async fn sign_in_with_provider(&self, provider: &str) -> Result<User, String>;
    /// End the session.
    async fn sign_out(&self);
}

/// Sign-up form fields.
#[derive(Clone, Debug, Default)]
pub struct SignUpForm {
    /// Email address.
    pub email: String,
    /// Desired display name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Password confirmation.
    pub confirm_password: String,
}

/// Auth flows wired to a provider and the shared [`AuthState`] store.
///
/// Failures never touch generation state; they only produce an inline message.
pub struct AuthSession<P> {
    provider: P,
    state: Store<AuthState>,
}

impl<P: IdentityProvider> AuthSession<P> {
    /// Bind a provider to an auth-state store.
    #[must_use]
    pub const fn new(provider: P, state: Store<AuthState>) -> Self {
        Self { provider, state }
    }

    /// Subscribe to auth changes; the callback runs immediately with the current state.
    pub fn on_auth_state_changed(
        &self,
        listener: impl Fn(&AuthState) + Send + Sync + 'static,
    ) -> Subscription<AuthState> {
        self.state.subscribe(listener)
    }

    /// Current state.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.state.get()
    }

    /// Sign in.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`] if the provider rejects the credentials.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self.provider.sign_in(email, password).await.map_err(|e| {
            tracing::warn!("Sign-in failed: {e}");
            AuthError::InvalidCredentials
        })?;
        self.signed_in(&user);
        Ok(user)
    }

    /// Sign up after checking the password confirmation locally.
    ///
    /// # Errors
    /// [`AuthError::PasswordMismatch`] without contacting the provider, or
    /// [`AuthError::RegistrationFailed`] if the provider rejects the account.
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<User, AuthError> {
        if form.password != form.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        let user = self
            .provider
            .sign_up(&form.email, &form.password, &form.username)
            .await
            .map_err(|e| {
                tracing::warn!("Sign-up failed: {e}");
                AuthError::RegistrationFailed
            })?;
        self.signed_in(&user);
        Ok(user)
    }

    /// Federated login through Google.
    ///
    /// # Errors
    /// [`AuthError::FederatedLoginFailed`] if the provider rejects the login.
    pub async fn sign_in_with_google(&self) -> Result<User, AuthError> {
        let user = self.provider.sign_in_with_provider("google").await.map_err(|e| {
            tracing::warn!("Federated sign-in failed: {e}");
            AuthError::FederatedLoginFailed
        })?;
        self.signed_in(&user);
        Ok(user)
    }

    /// Sign out and publish the anonymous state.
    pub async fn sign_out(&self) {
        self.provider.sign_out().await;
        self.state.set(AuthState {
            user: None,
            is_loading: false,
        });
    }

    fn signed_in(&self, user: &User) {
        tracing::info!(user_id = %user.id, "Signed in");
        self.state.set(AuthState {
            user: Some(user.clone()),
            is_loading: false,
        });
    }
}
