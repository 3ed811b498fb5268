//! Log event source
//!
//! Handlers register with [`LogEventSource::subscribe`] and stay registered
//! until the returned [`Subscription`] is dropped or unsubscribed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use super::LogEntry;

/// Receiver of log events.
///
/// Invoked synchronously on the thread that emitted the event, possibly from
/// several threads at once.
pub trait LogHandler: Send + Sync {
    fn on_log(&self, entry: &LogEntry);
}

impl<F> LogHandler for F
where
    F: Fn(&LogEntry) + Send + Sync,
{
    fn on_log(&self, entry: &LogEntry) {
        self(entry)
    }
}

type HandlerList = RwLock<Vec<(u64, Arc<dyn LogHandler>)>>;

struct Inner {
    handlers: HandlerList,
    next_id: AtomicU64,
}

/// Registration point for log handlers.
///
/// Cloning yields another handle to the same set of handlers.
#[derive(Clone)]
pub struct LogEventSource {
    inner: Arc<Inner>,
}

impl Default for LogEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSource {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a handler. It receives every event emitted until the
    /// returned subscription goes away.
    pub fn subscribe<H>(&self, handler: H) -> Subscription
    where
        H: LogHandler + 'static,
    {
        self.subscribe_arc(Arc::new(handler))
    }

    pub fn subscribe_arc(&self, handler: Arc<dyn LogHandler>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, handler));

        Subscription {
            id,
            source: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every registered handler.
    pub fn emit(&self, entry: &LogEntry) {
        // Snapshot so handlers may subscribe/unsubscribe without deadlocking
        let handlers: Vec<Arc<dyn LogHandler>> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, h)| h.clone())
            .collect();

        for handler in handlers {
            handler.on_log(entry);
        }
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// Handle for one registered handler. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the handler"]
pub struct Subscription {
    id: u64,
    source: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    fn remove(&self) {
        if let Some(inner) = self.source.upgrade() {
            inner
                .handlers
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
