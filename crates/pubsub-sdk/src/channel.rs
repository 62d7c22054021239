//! Subscription channel — one WebSocket, one topic.
//!
//! Owns the connection exclusively. A single reader task decodes each
//! inbound frame and demultiplexes it: data messages go to message
//! handlers, presence events go to join/leave handlers, malformed frames
//! go to error handlers with the connection left open. There is no
//! gateway failover here; on an unexpected close the application decides
//! whether and where to re-open (catch `on_close`/`on_error`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use mw_domain::{Error, GatewayConfig, Result, TraceEvent};
use parking_lot::Mutex;
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::envelope::{Frame, FrameEvent, PresenceLeave, PresenceMember, PubSubMessage};
use crate::options::SubscribeOptions;
use crate::registry::{HandlerRegistry, HandlerToken};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>, WsFrame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Clone, Default)]
struct Handlers {
    message: HandlerRegistry<PubSubMessage>,
    error: HandlerRegistry<Error>,
    close: HandlerRegistry<()>,
    join: HandlerRegistry<PresenceMember>,
    leave: HandlerRegistry<PresenceLeave>,
}

impl Handlers {
    fn clear_all(&self) {
        self.message.clear();
        self.error.clear();
        self.close.clear();
        self.join.clear();
        self.leave.clear();
    }
}

/// A live subscription to one topic.
pub struct Subscription {
    topic: String,
    presence_enabled: bool,
    member_id: Option<String>,
    state: Arc<Mutex<ConnectionState>>,
    handlers: Handlers,
    roster: Arc<Mutex<HashMap<String, PresenceMember>>>,
    shutdown: CancellationToken,
    writer: Mutex<Option<WsSink>>,
    reader: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Subscription {
    /// Open a subscription.
    ///
    /// The topic, presence parameters, and credential ride in the URL
    /// query string: header injection during the WebSocket upgrade is
    /// not portable across runtimes, so the gateway reads auth from
    /// `api_key`/`token` params instead.
    pub async fn open(
        cfg: &GatewayConfig,
        topic: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription> {
        let url = build_url(cfg, topic, &options);
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let connect_timeout = Duration::from_millis(cfg.connect_timeout_ms);

        tracing::debug!(topic = %topic, presence = options.presence, "opening subscription");

        let connected =
            tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(&url)).await;
        let (ws, _response) = match connected {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(Error::WebSocket(format!("connect failed: {e}"))),
            // The half-open socket is dropped here.
            Err(_) => {
                return Err(Error::WebSocket(format!(
                    "connect timed out after {}ms",
                    connect_timeout.as_millis()
                )))
            }
        };
        *state.lock() = ConnectionState::Open;

        let handlers = Handlers::default();
        let roster = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        let (sink, mut stream) = ws.split();

        let reader = tokio::spawn({
            let state = state.clone();
            let handlers = handlers.clone();
            let roster = roster.clone();
            let shutdown = shutdown.clone();
            let topic = topic.to_owned();
            async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        inbound = stream.next() => match inbound {
                            Some(Ok(WsFrame::Text(text))) => {
                                process_frame(&topic, &text, &handlers, &roster);
                            }
                            Some(Ok(WsFrame::Close(_))) | None => {
                                notify_closed(&topic, &state, &handlers);
                                break;
                            }
                            // Ping/pong are answered by tungstenite itself.
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                handlers.error.dispatch(&Error::WebSocket(e.to_string()));
                                notify_closed(&topic, &state, &handlers);
                                break;
                            }
                        }
                    }
                }
            }
        });

        TraceEvent::SubscriptionOpened {
            topic: topic.to_owned(),
            presence: options.presence,
        }
        .emit();

        Ok(Subscription {
            topic: topic.to_owned(),
            presence_enabled: options.presence,
            member_id: options.member_id,
            state,
            handlers,
            roster,
            shutdown,
            writer: Mutex::new(Some(sink)),
            reader: Mutex::new(Some(reader)),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn member_id(&self) -> Option<&str> {
        self.member_id.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    // ── handler registration ─────────────────────────────────────────

    pub fn on_message(&self, f: impl Fn(&PubSubMessage) + Send + Sync + 'static) -> HandlerToken {
        self.handlers.message.register(f)
    }

    pub fn off_message(&self, token: HandlerToken) {
        self.handlers.message.unregister(token);
    }

    pub fn on_error(&self, f: impl Fn(&Error) + Send + Sync + 'static) -> HandlerToken {
        self.handlers.error.register(f)
    }

    pub fn off_error(&self, token: HandlerToken) {
        self.handlers.error.unregister(token);
    }

    pub fn on_close(&self, f: impl Fn() + Send + Sync + 'static) -> HandlerToken {
        self.handlers.close.register(move |_| f())
    }

    pub fn off_close(&self, token: HandlerToken) {
        self.handlers.close.unregister(token);
    }

    pub fn on_join(&self, f: impl Fn(&PresenceMember) + Send + Sync + 'static) -> HandlerToken {
        self.handlers.join.register(f)
    }

    pub fn off_join(&self, token: HandlerToken) {
        self.handlers.join.unregister(token);
    }

    pub fn on_leave(&self, f: impl Fn(&PresenceLeave) + Send + Sync + 'static) -> HandlerToken {
        self.handlers.leave.register(f)
    }

    pub fn off_leave(&self, token: HandlerToken) {
        self.handlers.leave.unregister(token);
    }

    // ── presence ─────────────────────────────────────────────────────

    /// The current presence roster, sorted by member id.
    ///
    /// Calling this on a subscription opened without presence is a
    /// programmer error and fails with a usage error.
    pub fn presence(&self) -> Result<Vec<PresenceMember>> {
        if !self.presence_enabled {
            return Err(Error::Usage(
                "presence not enabled on this subscription; \
                 open with SubscribeOptions::presence(member_id)"
                    .into(),
            ));
        }
        let mut members: Vec<PresenceMember> = self.roster.lock().values().cloned().collect();
        members.sort_by(|a, b| a.member_id.cmp(&b.member_id));
        Ok(members)
    }

    // ── teardown ─────────────────────────────────────────────────────

    /// Close the subscription. Idempotent.
    ///
    /// Sends a Close frame to the gateway, waits for the reader task to
    /// finish its current frame, fires close handlers once across the
    /// subscription's lifetime, then clears every handler set — no
    /// callback fires after this returns.
    pub async fn close(&self) {
        self.shutdown.cancel();
        // Tell the gateway before dropping the socket; lock released
        // before the await.
        let writer = self.writer.lock().take();
        if let Some(mut sink) = writer {
            let _ = sink.send(WsFrame::Close(None)).await;
        }
        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        notify_closed(&self.topic, &self.state, &self.handlers);
        self.handlers.clear_all();
    }
}

// ── frame pipeline ───────────────────────────────────────────────────

fn process_frame(
    topic: &str,
    text: &str,
    handlers: &Handlers,
    roster: &Mutex<HashMap<String, PresenceMember>>,
) {
    let frame = match Frame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            // One bad frame must not kill the subscription.
            TraceEvent::FrameRejected {
                topic: topic.to_owned(),
                reason: e.to_string(),
            }
            .emit();
            handlers.error.dispatch(&e);
            return;
        }
    };

    if frame.topic != topic {
        // The gateway is the source of truth; deliver anyway.
        tracing::warn!(
            subscribed = %topic,
            received = %frame.topic,
            "frame topic does not match subscription"
        );
    }

    match frame.event {
        FrameEvent::Data { data, timestamp } => {
            handlers.message.dispatch(&PubSubMessage {
                topic: frame.topic,
                data,
                timestamp,
            });
        }
        FrameEvent::Join(member) => {
            roster
                .lock()
                .insert(member.member_id.clone(), member.clone());
            handlers.join.dispatch(&member);
        }
        FrameEvent::Leave(leave) => {
            roster.lock().remove(&leave.member_id);
            handlers.leave.dispatch(&leave);
        }
    }
}

fn notify_closed(topic: &str, state: &Mutex<ConnectionState>, handlers: &Handlers) {
    let first = {
        let mut st = state.lock();
        if *st == ConnectionState::Closed {
            false
        } else {
            *st = ConnectionState::Closed;
            true
        }
    };
    if first {
        handlers.close.dispatch(&());
        TraceEvent::SubscriptionClosed {
            topic: topic.to_owned(),
        }
        .emit();
    }
}

// ── URL construction ─────────────────────────────────────────────────

fn build_url(cfg: &GatewayConfig, topic: &str, options: &SubscribeOptions) -> String {
    let mut url = format!(
        "{}/v1/pubsub/ws?topic={}",
        cfg.ws_base(),
        encode_query(topic)
    );
    if options.presence {
        url.push_str("&presence=true");
        if let Some(ref id) = options.member_id {
            url.push_str("&member_id=");
            url.push_str(&encode_query(id));
        }
        if let Some(ref meta) = options.member_meta {
            url.push_str("&member_meta=");
            url.push_str(&encode_query(&meta.to_string()));
        }
    }
    if let Some(ref key) = cfg.api_key {
        url.push_str("&api_key=");
        url.push_str(&encode_query(key));
    } else if let Some(ref token) = cfg.bearer_token {
        url.push_str("&token=");
        url.push_str(&encode_query(token));
    }
    url
}

/// Percent-encode a query value (everything outside the unreserved set).
fn encode_query(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
