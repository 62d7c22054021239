//! `mw-domain` — shared types for the Meshway gateway client SDK.
//!
//! Holds the error taxonomy, the client configuration structs, and the
//! structured trace events emitted by the transport and pub/sub crates.
//! Every other `mw-*` crate depends on this one and nothing else inside
//! the workspace.

pub mod config;
pub mod error;
pub mod trace;

pub use config::GatewayConfig;
pub use error::{ApiError, Error, Result};
pub use trace::TraceEvent;
