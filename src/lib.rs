//! Device Console Library
//!
//! Session handling and device listing for the console client.

pub mod api;
pub mod auth;
pub mod backend;
pub mod commands;
pub mod config;
pub mod customers;
pub mod logging;
pub mod pagination;
pub mod routes;
pub mod storage;
pub mod tokens;

use std::sync::Arc;

use api::{ApiClient, ApiError};
use auth::SessionManager;
use backend::AuthBackend;
use config::Config;
use customers::CustomerClient;
use routes::{Navigator, Router};
use storage::Storage;
use tokens::{PreferenceStore, TokenStore};

/// Everything one browsing session needs, wired once at start-up
pub struct Console {
    pub session: SessionManager,
    pub customers: CustomerClient,
    pub router: Router,
    pub tokens: TokenStore,
    pub preference: PreferenceStore,
}

impl Console {
    /// Wire the console with the backend named in `config`
    pub fn new(
        config: &Config,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api_base_url, config.request_timeout)?;
        let backend: Arc<dyn AuthBackend> = Arc::from(config.backend.build(api.clone()));
        Ok(Self::with_backend(api, backend, storage, navigator))
    }

    /// Wire the console around an explicit backend
    pub fn with_backend(
        api: ApiClient,
        backend: Arc<dyn AuthBackend>,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let tokens = TokenStore::new(storage.clone());
        let preference = PreferenceStore::new(storage);
        let router = Router::new(tokens.clone(), navigator);

        Self {
            session: SessionManager::new(backend, tokens.clone(), preference.clone(), router.clone()),
            customers: CustomerClient::new(api, tokens.clone()),
            router,
            tokens,
            preference,
        }
    }
}
