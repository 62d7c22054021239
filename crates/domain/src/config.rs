//! Client configuration.
//!
//! `GatewayConfig` is owned by the host application and handed to the
//! transport at construction. All fields have serde defaults so a config
//! file only needs to name what it overrides.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gateway connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Candidate gateway base addresses, in failover order. One or many.
    #[serde(default = "d_base_urls")]
    pub base_urls: Vec<String>,
    /// WebSocket base address. Derived from the first base URL when unset.
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Hard per-request timeout. Overridable per call.
    #[serde(default = "d_8000")]
    pub timeout_ms: u64,
    /// Retries on the same gateway after the initial attempt.
    #[serde(default = "d_3")]
    pub max_retries: u32,
    /// Base delay for the linear backoff: `retry_delay_ms * (attempt + 1)`.
    #[serde(default = "d_250")]
    pub retry_delay_ms: u64,
    /// How long a gateway stays out of rotation after exhausting retries.
    #[serde(default = "d_30000")]
    pub failover_cooldown_ms: u64,
    /// Multiplier applied to `timeout_ms` for uploads (unbounded bodies).
    #[serde(default = "d_4")]
    pub upload_timeout_factor: u32,
    /// WebSocket connection-establishment timeout.
    #[serde(default = "d_10000")]
    pub connect_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_urls: d_base_urls(),
            ws_url: None,
            api_key: None,
            bearer_token: None,
            timeout_ms: 8_000,
            max_retries: 3,
            retry_delay_ms: 250,
            failover_cooldown_ms: 30_000,
            upload_timeout_factor: 4,
            connect_timeout_ms: 10_000,
        }
    }
}

impl GatewayConfig {
    /// The WebSocket base address: the explicit `ws_url` if set, otherwise
    /// the first base URL with the scheme rewritten (`http` → `ws`,
    /// `https` → `wss`).
    pub fn ws_base(&self) -> String {
        if let Some(ref ws) = self.ws_url {
            return ws.trim_end_matches('/').to_owned();
        }
        let base = self
            .base_urls
            .first()
            .map(String::as_str)
            .unwrap_or("http://localhost:8600");
        let base = base.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_owned()
        }
    }
}

fn d_base_urls() -> Vec<String> {
    vec!["http://localhost:8600".into()]
}
fn d_8000() -> u64 {
    8_000
}
fn d_250() -> u64 {
    250
}
fn d_30000() -> u64 {
    30_000
}
fn d_10000() -> u64 {
    10_000
}
fn d_3() -> u32 {
    3
}
fn d_4() -> u32 {
    4
}
