//! Session controller.
//!
//! Owns the [`SessionTracker`] on behalf of the application: wires its
//! callbacks into an event channel, records every lifecycle event in the
//! settings store, pushes it to WebSocket clients and stops the tracker
//! once the session is over.

use crate::database::Database;
use crate::tracker::{callback, SessionTracker};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Session lifecycle events emitted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn,
    Warning,
    Expired,
    LoggedOut,
}

impl SessionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionEvent::LoggedIn => "logged_in",
            SessionEvent::Warning => "warning",
            SessionEvent::Expired => "expired",
            SessionEvent::LoggedOut => "logged_out",
        }
    }

    /// Whether this event ends the session.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionEvent::Expired | SessionEvent::LoggedOut)
    }
}

/// Top-level owner of the session tracker.
pub struct SessionController {
    tracker: SessionTracker,
    database: Option<Arc<Database>>,
    broadcast_tx: broadcast::Sender<String>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,

    /// Set by [`logout`](Self::logout) so the expiry callback it triggers
    /// is reported as a logout rather than a timeout.
    manual_logout: Arc<AtomicBool>,
}

impl SessionController {
    /// Creates the controller and the receiver its [`run`](Self::run) loop
    /// consumes.
    ///
    /// `database` may be `None`, in which case events are only broadcast.
    pub fn new(
        tracker: SessionTracker,
        database: Option<Arc<Database>>,
        broadcast_tx: broadcast::Sender<String>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let controller = Arc::new(Self {
            tracker,
            database,
            broadcast_tx,
            events_tx,
            manual_logout: Arc::new(AtomicBool::new(false)),
        });

        (controller, events_rx)
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Starts (or restarts) a session.
    pub fn login(&self) {
        self.manual_logout.store(false, Ordering::SeqCst);

        let expiry_tx = self.events_tx.clone();
        let manual_logout = Arc::clone(&self.manual_logout);
        let on_expiry = callback(move || {
            let event = if manual_logout.swap(false, Ordering::SeqCst) {
                SessionEvent::LoggedOut
            } else {
                SessionEvent::Expired
            };
            let _ = expiry_tx.send(event);
        });

        let warning_tx = self.events_tx.clone();
        let on_warning = callback(move || {
            let _ = warning_tx.send(SessionEvent::Warning);
        });

        self.tracker.initialize(on_expiry, Some(on_warning));
        let _ = self.events_tx.send(SessionEvent::LoggedIn);
    }

    /// Ends the session immediately through the expiry callback.
    pub fn logout(&self) {
        self.manual_logout.store(true, Ordering::SeqCst);
        self.tracker.logout();
    }

    /// Processes events for the life of the controller.
    ///
    /// The controller keeps its own sender, so this never returns on its
    /// own; abort the task (or let the runtime shut down) to end it.
    pub async fn run(self: Arc<Self>, mut events_rx: mpsc::UnboundedReceiver<SessionEvent>) {
        tracing::info!("Session controller started");

        while let Some(event) = events_rx.recv().await {
            self.handle_event(event);
        }

        tracing::info!("Session controller shutting down");
    }

    /// Applies one event: stop on terminal events, then record and broadcast.
    pub fn handle_event(&self, event: SessionEvent) {
        if event.is_terminal() {
            self.tracker.stop();
        }

        let snapshot = self.tracker.snapshot();
        tracing::info!(event = event.as_str(), remaining = %snapshot.remaining, "Session event");

        if let Some(db) = &self.database {
            let detail = match event {
                SessionEvent::Warning => Some(format!("{} remaining", snapshot.remaining)),
                _ => None,
            };
            if let Err(e) = db.record_event(event.as_str(), chrono::Utc::now(), detail.as_deref())
            {
                tracing::warn!(?e, "Failed to record session event");
            }
        }

        broadcast_update(
            &self.broadcast_tx,
            &format!("session_{}", event.as_str()),
            &snapshot,
        );
    }
}

/// Sends an update to all connected WebSocket clients.
pub fn broadcast_update(
    tx: &broadcast::Sender<String>,
    update_type: &str,
    data: &impl serde::Serialize,
) {
    let message = serde_json::json!({
        "type": update_type,
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    if let Ok(json) = serde_json::to_string(&message) {
        // No receivers just means no clients are connected.
        let _ = tx.send(json);
    }
}
