//! Gateway pool: health and rotation order of candidate gateway
//! addresses.
//!
//! Binary health model per address: `Healthy -> Unhealthy` on
//! `mark_unhealthy`, back to `Healthy` when the cooldown deadline passes.
//! Expiry is checked lazily on read; there is no background sweep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mw_domain::{Error, Result};
use parking_lot::Mutex;

#[derive(Debug)]
struct Endpoint {
    address: String,
    unhealthy_until: Option<Instant>,
}

#[derive(Debug)]
struct PoolState {
    endpoints: Vec<Endpoint>,
    active: usize,
}

/// Tracks candidate gateway addresses and which one is active.
///
/// Cloned freely; all clones share the same health map and active index.
#[derive(Debug, Clone)]
pub struct GatewayPool {
    inner: Arc<Mutex<PoolState>>,
    cooldown: Duration,
}

impl GatewayPool {
    pub fn new(addresses: &[String], cooldown: Duration) -> Result<Self> {
        if addresses.is_empty() {
            return Err(Error::Config("at least one gateway address required".into()));
        }
        let endpoints = addresses
            .iter()
            .map(|a| Endpoint {
                address: a.trim_end_matches('/').to_owned(),
                unhealthy_until: None,
            })
            .collect();
        Ok(Self {
            inner: Arc::new(Mutex::new(PoolState {
                endpoints,
                active: 0,
            })),
            cooldown,
        })
    }

    /// The currently-selected gateway base address.
    pub fn current(&self) -> String {
        let state = self.inner.lock();
        state.endpoints[state.active].address.clone()
    }

    /// All configured addresses, in rotation order.
    pub fn addresses(&self) -> Vec<String> {
        self.inner
            .lock()
            .endpoints
            .iter()
            .map(|e| e.address.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Put `address` into cooldown.
    pub fn mark_unhealthy(&self, address: &str) {
        let mut state = self.inner.lock();
        if let Some(ep) = state.endpoints.iter_mut().find(|e| e.address == address) {
            ep.unhealthy_until = Some(Instant::now() + self.cooldown);
        }
    }

    /// Whether `address` is in rotation. A passed cooldown deadline
    /// clears itself here; no external reset is needed.
    pub fn is_healthy(&self, address: &str) -> bool {
        let mut state = self.inner.lock();
        match state.endpoints.iter_mut().find(|e| e.address == address) {
            Some(ep) => Self::check(ep),
            None => false,
        }
    }

    /// Advance to the next healthy gateway, scanning round-robin from
    /// after the active index. Returns false when every candidate is in
    /// cooldown (the caller must then surface the original error).
    pub fn advance_to_next_healthy(&self) -> bool {
        let mut state = self.inner.lock();
        let len = state.endpoints.len();
        for step in 1..=len {
            let idx = (state.active + step) % len;
            if Self::check(&mut state.endpoints[idx]) {
                state.active = idx;
                return true;
            }
        }
        false
    }

    fn check(ep: &mut Endpoint) -> bool {
        match ep.unhealthy_until {
            None => true,
            Some(deadline) if deadline <= Instant::now() => {
                ep.unhealthy_until = None;
                true
            }
            Some(_) => false,
        }
    }
}
