//! Per-call request options.

use std::time::Duration;

pub use reqwest::Method;

/// Options for one logical request. All fields optional.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Overrides the transport's default timeout for this call.
    pub timeout: Option<Duration>,
    /// Extra headers, appended after the auth headers.
    pub headers: Vec<(String, String)>,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = Some(d);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}
