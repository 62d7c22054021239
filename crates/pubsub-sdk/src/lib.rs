//! `mw-pubsub` — WebSocket subscription SDK for the Meshway gateway.
//!
//! One [`Subscription`] owns one persistent connection scoped to one
//! topic. Inbound frames are decoded into typed envelopes and
//! demultiplexed: data messages reach `on_message` handlers, presence
//! join/leave events reach `on_join`/`on_leave` handlers, and malformed
//! frames reach `on_error` handlers without closing the connection.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mw_domain::GatewayConfig;
//! use mw_pubsub::{SubscribeOptions, Subscription};
//!
//! # async fn example() -> mw_domain::Result<()> {
//! let cfg = GatewayConfig::default();
//! let sub = Subscription::open(
//!     &cfg,
//!     "room:1",
//!     SubscribeOptions::new().presence("alice"),
//! )
//! .await?;
//!
//! sub.on_message(|msg| {
//!     println!("{}: {} bytes", msg.topic, msg.data.len());
//! });
//! sub.on_join(|member| {
//!     println!("{} joined", member.member_id);
//! });
//! # Ok(())
//! # }
//! ```
//!
//! # Reconnection
//!
//! A subscription never fails over between gateways. On an unexpected
//! close, `on_close` handlers fire once and the application re-opens
//! against whichever gateway it chooses.

pub mod channel;
pub mod envelope;
pub mod options;
pub mod registry;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use channel::{ConnectionState, Subscription};
pub use envelope::{
    decode_payload, encode_payload, Envelope, Frame, FrameEvent, PresenceLeave, PresenceMember,
    PubSubMessage,
};
pub use options::SubscribeOptions;
pub use registry::{HandlerRegistry, HandlerToken};
