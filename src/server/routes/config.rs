//! Configuration endpoint.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub settings: Vec<ConfigSetting>,
}

#[derive(Debug, Serialize)]
pub struct ConfigSetting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

/// GET /api/config - Get all configuration settings
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConfigResponse>, StatusCode> {
    let db = state
        .database
        .as_ref()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    match db.get_all_config() {
        Ok(config) => {
            let settings = config
                .into_iter()
                .map(|(key, value, description)| ConfigSetting {
                    key,
                    value,
                    description,
                })
                .collect();

            Ok(Json(ConfigResponse { settings }))
        }
        Err(e) => {
            tracing::error!(?e, "Failed to fetch config");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
