//! Session event log endpoint.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::database::EventRecord;
use crate::server::state::AppState;

#[derive(Deserialize)]
pub struct EventsQuery {
    /// Limit results (default: 50)
    pub limit: Option<usize>,
}

/// GET /api/events - Recent session events, newest first.
pub async fn get_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventRecord>>, StatusCode> {
    let limit = query.limit.unwrap_or(50).min(500);

    let Some(db) = state.database.as_ref() else {
        return Ok(Json(vec![]));
    };

    db.recent_events(limit).map(Json).map_err(|e| {
        tracing::error!(?e, "Failed to fetch session events");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
