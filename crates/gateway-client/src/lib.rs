//! `mw-client` — resilient HTTP transport for the Meshway gateway.
//!
//! Executes one logical request end-to-end against a pool of candidate
//! gateway addresses: build the URL, attach the right credential headers
//! for the path, apply a timeout guard, retry transient failures with
//! linear backoff, and fail over to the next healthy gateway once
//! retries on the current one are exhausted.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mw_client::{Method, RequestOptions, RequestTransport};
//! use mw_domain::GatewayConfig;
//!
//! # async fn example() -> mw_domain::Result<()> {
//! let cfg = GatewayConfig {
//!     base_urls: vec!["http://g1:8600".into(), "http://g2:8600".into()],
//!     api_key: Some("mk_live_abc".into()),
//!     ..Default::default()
//! };
//! let transport = RequestTransport::new(&cfg)?;
//!
//! let schema: serde_json::Value = transport
//!     .execute(Method::GET, "/v1/rqlite/schema", None, &RequestOptions::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Failure model
//!
//! - Status in {408, 429, 500, 502, 503, 504}, connect errors, and
//!   timeouts are transient: retried on the same gateway, then failed
//!   over with a health cooldown.
//! - Any other non-2xx status is terminal: surfaced immediately as an
//!   [`ApiError`](mw_domain::ApiError) with status/code/details.
//! - When every gateway has been tried, the last error surfaces
//!   unwrapped — callers see the underlying cause.

pub mod auth;
pub mod pool;
pub mod retry;
pub mod transport;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use auth::{CredentialStore, Credentials};
pub use pool::GatewayPool;
pub use retry::{LinearBackoff, RetryPolicy};
pub use transport::{from_reqwest, ByteStream, RequestTransport};
pub use types::{Method, RequestOptions};
