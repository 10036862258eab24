//! Library handlers: the missing list, searches, unmonitoring and force grabs.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use eziarr_core::{
    GrabOutcome, GrabRequest, MediaType, MissingRecord, MissingRecordRepository, QueueItem,
    ReleaseCandidate,
};
use eziarr_jobs::actions;

use super::parse_service;
use crate::{ApiError, AppState};

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct MissingResponse {
    pub missing: Vec<MissingRecord>,
    pub queue: Vec<QueueItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub service: String,
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmonitorRequest {
    pub service: String,
    pub service_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DeepSearchRequest {
    #[serde(rename = "type")]
    pub media_type: String,
    pub query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceGrabRequest {
    pub service: String,
    pub service_id: i64,
    pub title: String,
    pub download_url: String,
}

// =============================================================================
// HANDLERS
// =============================================================================

pub async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok", "message": "Eziarr API is Running" }))
}

/// All mirrored records, newest release first, plus the active download queues.
pub async fn list_missing(State(state): State<AppState>) -> Result<Json<MissingResponse>, ApiError> {
    let (missing, queue) = tokio::join!(
        state.jobs.records.list(),
        actions::active_queue(&state.jobs.services)
    );
    Ok(Json(MissingResponse {
        missing: missing?,
        queue,
    }))
}

pub async fn trigger_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let service = parse_service(&req.service)?;
    info!(service = %service, item_id = req.id, "Received search request");

    actions::trigger_search(&state.jobs.services, service, req.id)
        .await
        .map_err(|e| {
            warn!(service = %service, item_id = req.id, error = %e, "Search failed");
            ApiError::Upstream("Failed to trigger search".into())
        })?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Search triggered for {} item {}", service, req.id),
    })))
}

pub async fn unmonitor(
    State(state): State<AppState>,
    Json(req): Json<UnmonitorRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let service = parse_service(&req.service)?;

    actions::unmonitor(&state.jobs, service, req.service_id)
        .await
        .map_err(|e| {
            warn!(service = %service, item_id = req.service_id, error = %e, "Unmonitor failed");
            ApiError::Upstream("Update failed".into())
        })?;

    Ok(Json(json!({ "success": true })))
}

/// Indexer search. Upstream failures yield an empty list.
pub async fn deep_search(
    State(state): State<AppState>,
    Json(req): Json<DeepSearchRequest>,
) -> Result<Json<Vec<ReleaseCandidate>>, ApiError> {
    let media_type: MediaType = req.media_type.parse()?;
    let results = actions::deep_search(state.indexer.as_ref(), media_type, &req.query).await;
    Ok(Json(results))
}

/// Push a release, correcting profile and queue blockers once if rejected.
pub async fn force_grab(
    State(state): State<AppState>,
    Json(req): Json<ForceGrabRequest>,
) -> Result<Json<GrabOutcome>, ApiError> {
    let request = GrabRequest {
        service: parse_service(&req.service)?,
        service_id: req.service_id,
        title: req.title,
        download_url: req.download_url,
    };
    Ok(Json(state.grab.grab(&request).await))
}
