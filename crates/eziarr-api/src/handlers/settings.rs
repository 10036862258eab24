//! Settings handlers.
//!
//! Writes go through the settings repository, which wakes the scheduler so
//! enablement and interval changes apply without waiting for the next poll.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use tracing::info;

use eziarr_core::SettingsRepository;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub key: String,
    pub value: JsonValue,
}

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<Map<String, JsonValue>>, ApiError> {
    Ok(Json(state.jobs.settings.all().await?))
}

pub async fn set_setting(
    State(state): State<AppState>,
    Json(req): Json<SetSettingRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    if req.key.trim().is_empty() {
        return Err(ApiError::BadRequest("Setting key is required".into()));
    }
    state.jobs.settings.set(&req.key, &req.value).await?;
    info!(key = %req.key, "Setting saved");

    let mut saved = Map::new();
    saved.insert(req.key, req.value);
    Ok(Json(json!({ "success": true, "saved": saved })))
}

pub async fn set_settings_batch(
    State(state): State<AppState>,
    Json(values): Json<Map<String, JsonValue>>,
) -> Result<Json<JsonValue>, ApiError> {
    state.jobs.settings.set_many(&values).await?;
    info!(count = values.len(), "Settings saved");
    Ok(Json(json!({ "success": true })))
}
