//! Session endpoints: status, activity, login and logout.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::activity::ActivityKind;
use crate::server::state::AppState;
use crate::tracker::TrackerSnapshot;

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub kind: ActivityKind,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    /// Number of listeners the signal was delivered to.
    pub delivered: usize,
    pub session: TrackerSnapshot,
}

/// GET /api/session - Current tracker state.
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<TrackerSnapshot> {
    Json(state.controller.tracker().snapshot())
}

/// POST /api/session/activity - Forward an interaction event.
///
/// Body: `{"kind": "pointer_move"}`. Signals inside the debounce window
/// are delivered but do not move the clock.
pub async fn post_activity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActivityRequest>,
) -> Json<ActivityResponse> {
    let delivered = state.hub.emit(request.kind);

    Json(ActivityResponse {
        delivered,
        session: state.controller.tracker().snapshot(),
    })
}

/// POST /api/session/login - Start or restart the session.
pub async fn login(State(state): State<Arc<AppState>>) -> Json<TrackerSnapshot> {
    state.controller.login();
    Json(state.controller.tracker().snapshot())
}

/// POST /api/session/logout - End the session now.
pub async fn logout(State(state): State<Arc<AppState>>) -> Json<TrackerSnapshot> {
    state.controller.logout();
    // Stop right away so the response reflects it; the controller's
    // event loop stopping again is a no-op.
    state.controller.tracker().stop();
    Json(state.controller.tracker().snapshot())
}
