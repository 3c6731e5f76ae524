//! API Module
//!
//! Shared HTTP plumbing for the console backend.

use std::time::Duration;

use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// HTTP client bound to one backend
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Start a request, attaching the bearer token when one is given
    pub fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let request = self.client.request(method, url);
        match bearer {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send and decode a JSON body
    pub async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Send and discard the body
    pub async fn execute_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    message: Option<String>,
    title: Option<String>,
}

/// Pick the most useful message out of an error body
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        if let Some(message) = parsed.error.or(parsed.message).or(parsed.title) {
            return message;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("Status: {}", status)
    } else {
        trimmed.to_string()
    }
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// Upstream HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_fields() {
        let message = error_message(StatusCode::UNAUTHORIZED, r#"{"message":"Invalid credentials"}"#);
        assert_eq!(message, "Invalid credentials");
    }

    #[test]
    fn error_message_falls_back_to_body_then_status() {
        assert_eq!(error_message(StatusCode::BAD_REQUEST, "nope\n"), "nope");
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "Status: 500 Internal Server Error"
        );
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let client = ApiClient::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        let request = client.request(Method::GET, "/api/v1/Devices", None).build().unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:5000/api/v1/Devices");
    }

    #[test]
    fn status_is_exposed_only_for_server_errors() {
        let err = ApiError::Status {
            status: 401,
            message: "Unauthorized".into(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(ApiError::Network("down".into()).status(), None);
    }
}
