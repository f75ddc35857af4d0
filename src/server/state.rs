//! Shared application state for the HTTP server.

use crate::activity::ActivityHub;
use crate::controller::SessionController;
use crate::database::Database;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast channel for WebSocket updates.
    pub broadcast_tx: broadcast::Sender<String>,

    pub controller: Arc<SessionController>,

    /// Activity signals posted by clients are emitted here.
    pub hub: Arc<ActivityHub>,

    /// Settings store, absent when running without persistence.
    pub database: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(
        broadcast_tx: broadcast::Sender<String>,
        controller: Arc<SessionController>,
        hub: Arc<ActivityHub>,
        database: Option<Arc<Database>>,
    ) -> Self {
        Self {
            broadcast_tx,
            controller,
            hub,
            database,
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }
}
