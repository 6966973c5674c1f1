//! Commerce API error types

use std::time::Duration;
use thiserror::Error;

/// Commerce API error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Network, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            GatewayErrorKind::Timeout,
            format!("request timed out after {}s", after.as_secs()),
        )
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Auth, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Rejected, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::NotFound, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Decode, message)
    }

    /// Map a transport-level reqwest failure
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(timeout)
        } else if err.is_decode() {
            Self::decode(format!("invalid response body: {err}"))
        } else {
            Self::network(format!("request failed: {err}"))
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = api_error_detail(body).unwrap_or_else(|| body.trim().to_string());
        match status.as_u16() {
            401 | 403 => Self::auth(format!("authentication failed: {detail}")),
            404 => Self::not_found(format!("not found: {detail}")),
            408 => Self::network(format!("request timeout: {detail}")),
            429 => Self::server_error(format!("rate limited: {detail}")),
            500..=599 => Self::server_error(format!("server error {status}: {detail}")),
            _ => Self::rejected(detail),
        }
    }
}

/// Pull a readable message out of a JSON:API `errors` array
fn api_error_detail(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    let errors = parsed.get("errors")?.as_array()?;
    let details: Vec<&str> = errors
        .iter()
        .filter_map(|e| {
            e.get("detail")
                .or_else(|| e.get("title"))
                .and_then(serde_json::Value::as_str)
        })
        .collect();
    if details.is_empty() {
        None
    } else {
        Some(details.join("; "))
    }
}

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Connection refused/reset - transient
    Network,
    /// Request exceeded its deadline - transient
    Timeout,
    /// 5xx or rate limiting - transient
    ServerError,
    /// Token rejected (401, 403) - refresh and retry once
    Auth,
    /// Well-formed refusal (400, 409, 422...)
    Rejected,
    /// Product, item or file does not exist
    NotFound,
    /// Response did not match the expected shape
    Decode,
}

impl GatewayErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::ServerError)
    }
}
