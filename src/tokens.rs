//! Token and Preference Stores
//!
//! Typed views over the persistence medium for the bearer tokens and the
//! "remember me" choice.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::storage::{Lifetime, Storage, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const REMEMBER_KEY: &str = "auth_remember";

/// Max age of remembered tokens and of the preference itself
pub const REMEMBER_DAYS: i64 = 30;

/// Holds the "remember me" choice for up to 30 days, whatever its value
#[derive(Clone)]
pub struct PreferenceStore {
    storage: Arc<dyn Storage>,
}

impl PreferenceStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Read the preference, defaulting to `false`
    pub fn get(&self) -> bool {
        match self.storage.get(REMEMBER_KEY) {
            Ok(Some(value)) => value == "true",
            Ok(None) => false,
            Err(e) => {
                warn!("Preference unreadable, assuming false: {}", e);
                false
            }
        }
    }

    pub fn set(&self, remember: bool) {
        let value = if remember { "true" } else { "false" };
        if let Err(e) = self
            .storage
            .set(REMEMBER_KEY, value, Lifetime::days(REMEMBER_DAYS))
        {
            warn!("Failed to persist preference: {}", e);
        }
    }
}

/// Holds the access/refresh token pair
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Write both tokens with a shared lifetime. `None` removes that entry.
    ///
    /// Either both writes land or the store is left as it was.
    pub fn set_tokens(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
        persistent: bool,
    ) -> Result<(), StorageError> {
        let lifetime = if persistent {
            Lifetime::days(REMEMBER_DAYS)
        } else {
            Lifetime::Session
        };

        debug!("Writing tokens (persistent: {})", persistent);
        let previous = self.snapshot(ACCESS_TOKEN_KEY);
        self.write(ACCESS_TOKEN_KEY, access, lifetime)?;

        if let Err(e) = self.write(REFRESH_TOKEN_KEY, refresh, lifetime) {
            error!("Failed to write refresh token, restoring access token: {}", e);
            self.restore(ACCESS_TOKEN_KEY, previous);
            return Err(e);
        }
        Ok(())
    }

    pub fn clear(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.write(key, None, Lifetime::Session) {
                error!("Failed to clear {}: {}", key, e);
            }
        }
    }

    /// True iff a non-empty access token is present
    pub fn logged_in(&self) -> bool {
        self.access_token().is_some_and(|token| !token.is_empty())
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to read {}: {}", key, e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: Option<&str>, lifetime: Lifetime) -> Result<(), StorageError> {
        match value {
            Some(value) => self.storage.set(key, value, lifetime),
            None => self.storage.remove(key),
        }
    }

    fn snapshot(&self, key: &str) -> Option<(String, Lifetime)> {
        let value = self.storage.get(key).ok().flatten()?;
        let lifetime = self
            .storage
            .lifetime(key)
            .ok()
            .flatten()
            .unwrap_or(Lifetime::Session);
        Some((value, lifetime))
    }

    fn restore(&self, key: &str, previous: Option<(String, Lifetime)>) {
        let result = match &previous {
            Some((value, lifetime)) => self.storage.set(key, value, *lifetime),
            None => self.storage.remove(key),
        };

        if let Err(e) = result {
            error!("Failed to restore {}: {}", key, e);
        }
    }
}
