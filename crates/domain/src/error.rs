//! Shared error type used across all Meshway client crates.
//!
//! Every transport-origin failure is a single [`ApiError`] carrying a
//! numeric status, a short string code, and a structured details bag.
//! Callers branch on `status`/`code`; message text is for humans and logs
//! only.

/// HTTP statuses the transport treats as transient.
pub const RETRYABLE_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Code attached to failures that never reached the gateway
/// (DNS, connection refused, TLS, broken pipe).
pub const CODE_NETWORK_ERROR: &str = "NETWORK_ERROR";

/// Code attached to requests cancelled by the timeout guard.
pub const CODE_TIMEOUT: &str = "TIMEOUT";

/// A typed failure from (or on the way to) the gateway.
///
/// `status` is the HTTP status, or `0` when no response was received.
/// `code` is the gateway's machine-readable code, falling back to
/// `HTTP_<status>` when the error payload omits one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("gateway error {status} ({code}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl ApiError {
    /// An HTTP-level error with an explicit status.
    pub fn http(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// A network-level failure before any response (status 0).
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            code: CODE_NETWORK_ERROR.into(),
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// A request cancelled by the timeout guard. Treated as transient.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            code: CODE_TIMEOUT.into(),
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Whether the transport may retry this failure.
    ///
    /// True for the retryable status set and for anything that never got
    /// a response (network errors and timeouts report status 0).
    pub fn is_retryable(&self) -> bool {
        self.status == 0 || RETRYABLE_STATUSES.contains(&self.status)
    }
}

/// Shared error type for the SDK.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Transport-origin failure (HTTP error payload, network, timeout).
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Caller misuse (e.g. presence queried on a non-presence
    /// subscription). Distinct from transport errors; never retried.
    #[error("usage: {0}")]
    Usage(String),

    #[error("config: {0}")]
    Config(String),

    /// A WebSocket frame that failed the envelope decode pipeline.
    #[error("decode: {0}")]
    Decode(String),

    #[error("websocket: {0}")]
    WebSocket(String),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Numeric status for branching; 0 for non-HTTP failures.
    pub fn status(&self) -> u16 {
        match self {
            Error::Api(e) => e.status,
            _ => 0,
        }
    }

    /// Short machine-readable code for branching.
    pub fn code(&self) -> &str {
        match self {
            Error::Api(e) => &e.code,
            Error::Usage(_) => "USAGE",
            Error::Config(_) => "CONFIG",
            Error::Decode(_) => "DECODE",
            Error::WebSocket(_) => "WEBSOCKET",
            Error::Json(_) => "JSON",
        }
    }

    /// Whether the transport may retry the operation that produced this.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
