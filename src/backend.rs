//! Authentication backends
//!
//! The console has been deployed against two authentication APIs that differ
//! in paths, body encoding and field names. Both are exposed through
//! [`AuthBackend`] and chosen by [`BackendKind`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, ApiError};

/// Tokens minted by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    /// Absent when the backend did not rotate the refresh token
    pub refresh_token: Option<String>,
}

/// Remote authentication capability
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a token pair
    async fn login(&self, identifier: &str, secret: &str) -> Result<TokenPair, ApiError>;

    /// Mint a new access token from a refresh token
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

/// Which backend contract to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `/api/Token/*`, JSON bodies, `token`/`refreshToken`
    #[default]
    Token,
    /// `/api/latest/auth/*`, form login, `access_token`/`refresh_token`
    Local,
}

impl BackendKind {
    pub fn build(self, api: ApiClient) -> Box<dyn AuthBackend> {
        match self {
            BackendKind::Token => Box::new(TokenApiBackend::new(api)),
            BackendKind::Local => Box::new(LocalTokenBackend::new(api)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Token => write!(f, "token"),
            BackendKind::Local => write!(f, "local"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" | "a" => Ok(BackendKind::Token),
            "local" | "b" => Ok(BackendKind::Local),
            other => Err(format!("unknown auth backend: {}", other)),
        }
    }
}

/// Reject empty or missing token fields
fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ApiError::Parse(format!("response is missing `{}`", field))),
    }
}

// Token API

pub struct TokenApiBackend {
    api: ApiClient,
}

impl TokenApiBackend {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[derive(Serialize)]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: Option<String>,
    refresh_token: Option<String>,
}

#[async_trait]
impl AuthBackend for TokenApiBackend {
    async fn login(&self, identifier: &str, secret: &str) -> Result<TokenPair, ApiError> {
        let request = self
            .api
            .request(Method::POST, "/api/Token/login", None)
            .json(&CredentialsRequest {
                email: identifier,
                password: secret,
            });

        let response: TokenResponse = self.api.execute(request).await?;
        Ok(TokenPair {
            access_token: required("token", response.token)?,
            refresh_token: Some(required("refreshToken", response.refresh_token)?),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let request = self
            .api
            .request(Method::POST, "/api/Token/refresh", None)
            .json(&TokenRefreshRequest { refresh_token });

        let response: TokenResponse = self.api.execute(request).await?;
        Ok(TokenPair {
            access_token: required("token", response.token)?,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
        })
    }
}

// Local token API

pub struct LocalTokenBackend {
    api: ApiClient,
}

impl LocalTokenBackend {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    grant_type: &'static str,
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LocalRefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct LocalTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[async_trait]
impl AuthBackend for LocalTokenBackend {
    async fn login(&self, identifier: &str, secret: &str) -> Result<TokenPair, ApiError> {
        let request = self
            .api
            .request(Method::POST, "/api/latest/auth/local_token", None)
            .form(&PasswordGrant {
                grant_type: "password",
                username: identifier,
                password: secret,
            });

        let response: LocalTokenResponse = self.api.execute(request).await?;
        Ok(TokenPair {
            access_token: required("access_token", response.access_token)?,
            refresh_token: Some(required("refresh_token", response.refresh_token)?),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let request = self
            .api
            .request(Method::POST, "/api/latest/auth/refresh", None)
            .json(&LocalRefreshRequest { refresh_token });

        let response: LocalTokenResponse = self.api.execute(request).await?;
        Ok(TokenPair {
            access_token: required("access_token", response.access_token)?,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
        })
    }
}
