use std::time::Duration;
use thiserror::Error;

/// Coarse failure class of a gateway call.
///
/// The controller picks its user-facing message from the operation and this
/// class only; the concrete variant is kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The call did not complete (connection, DNS, TLS, timeout).
    Transport,
    /// The backend answered with a non-success status.
    Status,
    /// The response body could not be decoded.
    Parse,
}

/// Errors returned by [`Gateway`](super::Gateway) calls.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The request plus body read exceeded the configured timeout
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// Non-2xx response. `detail` is the backend's error text when it sent one.
    #[error("HTTP error: status {status}{}", describe_detail(.detail))]
    Status { status: u16, detail: Option<String> },
    /// Body was not valid JSON or did not have the expected shape
    #[error("Invalid response body: {0}")]
    Parse(#[from] serde_json::Error),
    /// Body exceeded the size cap
    #[error("Response too large (exceeds {0} bytes)")]
    TooLarge(usize),
    /// The request path could not be joined onto the base URL
    #[error("Invalid request path: {0}")]
    InvalidPath(#[from] url::ParseError),
}

fn describe_detail(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Transport(_) | GatewayError::Timeout(_) | GatewayError::InvalidPath(_) => {
                ErrorKind::Transport
            }
            GatewayError::Status { .. } => ErrorKind::Status,
            GatewayError::Parse(_) | GatewayError::TooLarge(_) => ErrorKind::Parse,
        }
    }

    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Backend-provided error text, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            GatewayError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers `{"detail": "..."}`; the fronting gateway answers
/// `{"error": "..."}` when it throttles. Validation failures carry a list
/// under `detail`, which is not a message and is ignored.
pub(crate) fn extract_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["detail", "error"].iter().find_map(|key| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}
