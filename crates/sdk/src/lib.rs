//! `mw-sdk` — the Meshway gateway client facade.
//!
//! Feature clients (database, cache, storage, pub/sub publishing,
//! network status) are thin wrappers the application builds on top of
//! this surface; the SDK itself only provides the resilient transport
//! and the subscription channel.
//!
//! ```rust,no_run
//! use mw_domain::GatewayConfig;
//! use mw_sdk::{Method, MeshwayClient, RequestOptions, SubscribeOptions};
//!
//! # async fn example() -> mw_domain::Result<()> {
//! let client = MeshwayClient::new(GatewayConfig {
//!     base_urls: vec!["http://g1:8600".into(), "http://g2:8600".into()],
//!     api_key: Some("mk_live_abc".into()),
//!     ..Default::default()
//! })?;
//!
//! // Database namespace, through the failover transport.
//! let schema: serde_json::Value = client
//!     .execute(Method::GET, "/v1/rqlite/schema", None, &RequestOptions::new())
//!     .await?;
//!
//! // Topic subscription with presence.
//! let sub = client
//!     .subscribe("room:1", SubscribeOptions::new().presence("alice"))
//!     .await?;
//! sub.on_message(|msg| println!("{} bytes on {}", msg.data.len(), msg.topic));
//! # Ok(())
//! # }
//! ```

use mw_client::{ByteStream, RequestTransport};
use mw_domain::{GatewayConfig, Result};
use mw_pubsub::Subscription;
use serde::de::DeserializeOwned;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use mw_client::{LinearBackoff, Method, RequestOptions, RetryPolicy};
pub use mw_domain::{ApiError, Error, TraceEvent};
pub use mw_pubsub::{
    ConnectionState, PresenceLeave, PresenceMember, PubSubMessage, SubscribeOptions,
};

/// One client per gateway deployment; cheap to clone, clones share
/// credentials and gateway health state.
#[derive(Clone)]
pub struct MeshwayClient {
    cfg: GatewayConfig,
    transport: RequestTransport,
}

impl MeshwayClient {
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let transport = RequestTransport::new(&cfg)?;
        Ok(Self { cfg, transport })
    }

    /// The underlying transport, for feature clients that need it.
    pub fn transport(&self) -> &RequestTransport {
        &self.transport
    }

    // ── HTTP surface ─────────────────────────────────────────────────

    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        opts: &RequestOptions,
    ) -> Result<T> {
        self.transport.execute(method, path, body, opts).await
    }

    pub async fn get_binary(&self, path: &str) -> Result<ByteStream> {
        self.transport
            .get_binary(path, &RequestOptions::new())
            .await
    }

    pub async fn upload_file<T, F>(
        &self,
        path: &str,
        make_form: F,
        opts: &RequestOptions,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::multipart::Form,
    {
        self.transport.upload(path, make_form, opts).await
    }

    // ── streaming surface ────────────────────────────────────────────

    /// Open a topic subscription with the client's current credentials.
    pub async fn subscribe(&self, topic: &str, options: SubscribeOptions) -> Result<Subscription> {
        let mut cfg = self.cfg.clone();
        let creds = self.transport.credentials().snapshot();
        cfg.api_key = creds.api_key;
        cfg.bearer_token = creds.bearer_token;
        Subscription::open(&cfg, topic, options).await
    }

    // ── credentials / topology ───────────────────────────────────────

    pub fn set_api_key(&self, key: impl Into<String>) {
        self.transport.set_api_key(key);
    }

    pub fn set_bearer_token(&self, token: impl Into<String>) {
        self.transport.set_bearer_token(token);
    }

    pub fn base_urls(&self) -> Vec<String> {
        self.transport.base_urls()
    }
}
