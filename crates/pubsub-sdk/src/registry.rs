//! Observer registry — owns the handler sets a subscription dispatches to.
//!
//! `register` hands back a token; `unregister` with that token removes
//! exactly that handler. Dispatch snapshots the handler set under the
//! lock and invokes outside it, so a handler may register or unregister
//! others without deadlocking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Token returned by [`HandlerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken(u64);

/// A set of callbacks for one event kind.
pub struct HandlerRegistry<T> {
    inner: Arc<Mutex<HashMap<u64, Arc<dyn Fn(&T) + Send + Sync>>>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for HandlerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add a handler; the token unregisters exactly this handler.
    pub fn register(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> HandlerToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().insert(id, Arc::new(handler));
        HandlerToken(id)
    }

    /// Remove one handler. Unknown or already-removed tokens are no-ops.
    pub fn unregister(&self, token: HandlerToken) {
        self.inner.lock().remove(&token.0);
    }

    /// Invoke every registered handler with `value`, in no defined order.
    pub fn dispatch(&self, value: &T) {
        let snapshot: Vec<Arc<dyn Fn(&T) + Send + Sync>> =
            self.inner.lock().values().cloned().collect();
        for handler in snapshot {
            handler(value);
        }
    }

    /// Drop every handler.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
