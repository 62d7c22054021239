use serde::Serialize;

/// Structured trace events emitted across the Meshway client crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    /// One attempt of one logical HTTP request (emitted per attempt,
    /// success or failure; `status` is 0 when no response was received).
    GatewayCall {
        endpoint: String,
        gateway: String,
        status: u16,
        attempt: u32,
        duration_ms: u64,
    },
    /// The transport rotated to another gateway after exhausting retries.
    GatewayFailover {
        from: String,
        to: String,
        cooldown_ms: u64,
    },
    /// An inbound WebSocket frame failed the decode pipeline.
    FrameRejected {
        topic: String,
        reason: String,
    },
    SubscriptionOpened {
        topic: String,
        presence: bool,
    },
    SubscriptionClosed {
        topic: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "mw_event");
    }
}
