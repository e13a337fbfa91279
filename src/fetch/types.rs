//! Request/response types and the fetch error taxonomy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One logical GET request against the venue's REST APIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Base URL (e.g. "https://clob.polymarket.com")
    pub base_url: String,
    /// Path below the base URL (e.g. "/trades")
    pub path: String,
    /// Query parameters in insertion order
    pub query: Vec<(String, String)>,
}

impl Request {
    /// Create a request with no query parameters
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Look up the first value of a query parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Full URL without the query string
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// Raw outcome of a single HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Successful, parsed response
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Parsed JSON body
    pub body: serde_json::Value,
    /// Number of attempts it took to get this response
    pub attempts: u32,
}

/// Failure below the HTTP layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts and connection resets are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Connection(_))
    }
}

/// Broad class of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 429, 5xx, timeouts, connection resets
    Retryable,
    /// Other 4xx, malformed bodies, unusable requests
    Fatal,
}

/// Classify an HTTP status code. Returns None for success.
pub fn classify_status(status: u16) -> Option<ErrorClass> {
    match status {
        200..=299 => None,
        429 | 500..=599 => Some(ErrorClass::Retryable),
        _ => Some(ErrorClass::Fatal),
    }
}

/// Terminal result of a logical fetch
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Non-retryable HTTP status (401, 403, 404, ...)
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// 2xx body that is not valid JSON
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Request could not be issued at all
    #[error("transport error: {0}")]
    Transport(String),

    /// Retryable failures until max_attempts ran out
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl FetchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FetchError::Exhausted { .. } => ErrorClass::Retryable,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }

    /// HTTP status when the failure came from the server
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
