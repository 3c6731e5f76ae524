//! Authentication Module
//!
//! Session lifecycle: login, silent refresh and logout.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::api::ApiError;
use crate::backend::AuthBackend;
use crate::routes::{Router, LANDING_PATH, LOGIN_PATH};
use crate::storage::StorageError;
use crate::tokens::{PreferenceStore, TokenStore};

/// Whether the current process holds a usable access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// Result of a refresh attempt
#[derive(Debug)]
pub enum RefreshOutcome {
    /// No refresh token; nothing was sent
    Skipped,
    /// New tokens stored
    Refreshed,
    /// Backend refused or the new tokens could not be kept; the session
    /// was torn down
    Terminated(RefreshError),
}

/// Login failed
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Authentication failed: {0}")]
    Rejected(#[from] ApiError),

    #[error("Authentication failed, tokens not stored: {0}")]
    Storage(#[from] StorageError),
}

impl AuthenticationError {
    /// HTTP status of a backend rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthenticationError::Rejected(e) => e.status(),
            AuthenticationError::Storage(_) => None,
        }
    }
}

/// Refresh failed
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Refresh failed: {0}")]
    Rejected(#[from] ApiError),

    #[error("Refresh failed, tokens not stored: {0}")]
    Storage(#[from] StorageError),
}

impl RefreshError {
    /// HTTP status of a backend rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            RefreshError::Rejected(e) => e.status(),
            RefreshError::Storage(_) => None,
        }
    }
}

/// Drives the session against the configured backend
pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    tokens: TokenStore,
    preference: PreferenceStore,
    router: Router,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        tokens: TokenStore,
        preference: PreferenceStore,
        router: Router,
    ) -> Self {
        Self {
            backend,
            tokens,
            preference,
            router,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.tokens.logged_in() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    pub fn logged_in(&self) -> bool {
        self.tokens.logged_in()
    }

    pub fn remember(&self) -> bool {
        self.preference.get()
    }

    /// Authenticate and land on the customer list.
    ///
    /// The preference is stored before the call goes out, so a rejected login
    /// still records the choice. Tokens are only written once both are known,
    /// and a pair that cannot be stored fails the login without navigating.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
        remember: bool,
    ) -> Result<(), AuthenticationError> {
        self.preference.set(remember);

        let pair = match self.backend.login(identifier, secret).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Login rejected: {}", e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.tokens.set_tokens(
            Some(pair.access_token.as_str()),
            pair.refresh_token.as_deref(),
            remember,
        ) {
            warn!("Login succeeded but tokens were not stored: {}", e);
            return Err(e.into());
        }
        info!("Logged in (remember: {})", remember);

        self.router.navigate(LANDING_PATH);
        Ok(())
    }

    /// Rotate the access token. Any failure ends the session and sends the
    /// user back to login; it is never surfaced as an error.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(current) = self.tokens.refresh_token().filter(|t| !t.is_empty()) else {
            return RefreshOutcome::Skipped;
        };

        match self.backend.refresh(&current).await {
            Ok(pair) => {
                let refresh = pair.refresh_token.unwrap_or(current);
                match self.tokens.set_tokens(
                    Some(pair.access_token.as_str()),
                    Some(refresh.as_str()),
                    self.preference.get(),
                ) {
                    Ok(()) => {
                        info!("Session refreshed");
                        RefreshOutcome::Refreshed
                    }
                    Err(e) => self.terminate(e.into()),
                }
            }
            Err(e) => self.terminate(e.into()),
        }
    }

    fn terminate(&self, error: RefreshError) -> RefreshOutcome {
        warn!("Refresh failed, ending session: {}", error);
        self.tokens.clear();
        self.router.navigate(LOGIN_PATH);
        RefreshOutcome::Terminated(error)
    }

    /// Forget the session and the preference. Safe to repeat.
    pub fn logout(&self) {
        self.preference.set(false);
        self.tokens.clear();
        info!("Logged out");
        self.router.navigate(LOGIN_PATH);
    }
}
