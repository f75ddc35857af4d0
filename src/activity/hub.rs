//! In-process activity dispatcher.
//!
//! Forwards interaction events from whatever produces them (HTTP clients,
//! input adapters, tests) to subscribed listeners, and keeps lock-free
//! per-kind counters of everything it has seen.

use super::source::{ActivityKind, ActivityListener, ActivitySource, SubscriptionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Thread-safe [`ActivitySource`] that dispatches events synchronously.
#[derive(Default)]
pub struct ActivityHub {
    listeners: Mutex<HashMap<SubscriptionId, ActivityListener>>,
    next_id: AtomicU64,
    counts: [AtomicU64; 6],
}

impl ActivityHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<SubscriptionId, ActivityListener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delivers one event to every current listener.
    ///
    /// Listeners run on the calling thread, after the listener table has
    /// been released. Returns the number of listeners notified.
    pub fn emit(&self, kind: ActivityKind) -> usize {
        self.counts[kind.index()].fetch_add(1, Ordering::Relaxed);

        let listeners: Vec<ActivityListener> = self.listeners().values().cloned().collect();
        for listener in &listeners {
            listener(kind);
        }

        tracing::trace!(kind = %kind, listeners = listeners.len(), "Activity emitted");
        listeners.len()
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    /// Reads per-kind event counts without resetting them.
    pub fn counts(&self) -> HashMap<ActivityKind, u64> {
        ActivityKind::ALL
            .iter()
            .map(|kind| (*kind, self.counts[kind.index()].load(Ordering::Relaxed)))
            .collect()
    }

    /// Atomically reads and resets the per-kind event counts.
    pub fn flush_counts(&self) -> HashMap<ActivityKind, u64> {
        ActivityKind::ALL
            .iter()
            .map(|kind| (*kind, self.counts[kind.index()].swap(0, Ordering::Relaxed)))
            .collect()
    }
}

impl ActivitySource for ActivityHub {
    fn subscribe(&self, listener: ActivityListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners().insert(id, listener);
        tracing::debug!(id = id.0, "Activity listener subscribed");
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.listeners().remove(&id).is_some();
        if removed {
            tracing::debug!(id = id.0, "Activity listener unsubscribed");
        }
        removed
    }
}
