//! HTTP server module for API and WebSocket endpoints.
//!
//! Lets an external warning dialog read the remaining session time, forward
//! activity signals and receive warning/expiry notifications in real time.

pub mod routes;
pub mod state;
pub mod ws;

use crate::server::routes::{config, events, health, session};
use crate::server::state::AppState;
use crate::server::ws::ws_handler;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Default server port.
pub const DEFAULT_PORT: u16 = 13235;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    // CORS layer for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Session API
        .route("/api/session", get(session::get_session))
        .route("/api/session/activity", post(session::post_activity))
        .route("/api/session/login", post(session::login))
        .route("/api/session/logout", post(session::logout))
        // Event log
        .route("/api/events", get(events::get_events))
        // Config API
        .route("/api/config", get(config::get_config))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Serves the API on localhost until the listener fails.
pub async fn run_server(state: Arc<AppState>, port: u16) -> std::io::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app).await
}
