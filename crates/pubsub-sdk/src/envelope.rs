//! Wire envelope decoding.
//!
//! Every inbound text frame is JSON with this shape:
//!
//! ```json
//! { "data": "<base64>", "type": "presence.join", "timestamp": 1000,
//!   "topic": "room:1", "member_id": "bob", "meta": {} }
//! ```
//!
//! Decoding is an explicit three-way classification: a presence event
//! (requires `type` + `member_id`), a data message (requires `data`), or
//! malformed. Malformed frames are reported and never kill the
//! connection.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mw_domain::{Error, Result};
use serde::Deserialize;

/// Raw decoded frame, before message/presence demultiplexing.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub data: Option<String>,
    pub topic: Option<String>,
    pub timestamp: Option<i64>,
    pub member_id: Option<String>,
    pub meta: Option<serde_json::Value>,
}

/// A message delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    pub topic: String,
    pub data: Vec<u8>,
    pub timestamp: i64,
}

/// A member announced on the presence roster.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceMember {
    pub member_id: String,
    pub joined_at: i64,
    pub meta: Option<serde_json::Value>,
}

/// A member leaving the presence roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceLeave {
    pub member_id: String,
    pub timestamp: i64,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub topic: String,
    pub event: FrameEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Data { data: Vec<u8>, timestamp: i64 },
    Join(PresenceMember),
    Leave(PresenceLeave),
}

impl Frame {
    /// Decode one text frame.
    ///
    /// Validation order: JSON parse, required `topic`/`timestamp`, then
    /// the presence-vs-data classification, then the base64 payload.
    pub fn decode(text: &str) -> Result<Frame> {
        let env: Envelope = serde_json::from_str(text)
            .map_err(|e| Error::Decode(format!("invalid frame JSON: {e}")))?;

        let topic = env
            .topic
            .ok_or_else(|| Error::Decode("frame missing topic".into()))?;
        let timestamp = env
            .timestamp
            .ok_or_else(|| Error::Decode("frame missing timestamp".into()))?;

        let event = match env.kind.as_deref() {
            Some(kind @ ("presence.join" | "presence.leave")) => {
                let member_id = env
                    .member_id
                    .ok_or_else(|| Error::Decode(format!("{kind} frame missing member_id")))?;
                if kind == "presence.join" {
                    FrameEvent::Join(PresenceMember {
                        member_id,
                        joined_at: timestamp,
                        meta: env.meta,
                    })
                } else {
                    FrameEvent::Leave(PresenceLeave {
                        member_id,
                        timestamp,
                    })
                }
            }
            Some(other) => {
                return Err(Error::Decode(format!("unknown frame type: {other}")));
            }
            None => {
                let data = env
                    .data
                    .ok_or_else(|| Error::Decode("data frame missing data".into()))?;
                let data = decode_payload(&data)?;
                FrameEvent::Data { data, timestamp }
            }
        };

        Ok(Frame { topic, event })
    }
}

/// Encode a payload for publishing.
pub fn encode_payload(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode a frame's base64 payload.
pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data)
        .map_err(|e| Error::Decode(format!("invalid base64 payload: {e}")))
}
