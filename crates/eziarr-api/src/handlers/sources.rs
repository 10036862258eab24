//! Alternative-source handlers: messaging platform, public archive, open
//! directories and direct HTTP imports.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use eziarr_core::Service;
use eziarr_jobs::actions;
use eziarr_sources::{ArchiveFile, ArchiveItem, LoginOutcome, MessageHit, OpenDirFile};

use super::parse_service;
use crate::{ApiError, AppState};

// =============================================================================
// REQUEST TYPES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SendCodeRequest {
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub code: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageSearchRequest {
    pub channel: String,
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageImportRequest {
    pub service: Option<String>,
    pub service_id: Option<i64>,
    pub channel: Option<String>,
    pub message_id: Option<i64>,
    pub filename: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpImportRequest {
    pub service: Option<String>,
    pub service_id: Option<i64>,
    pub url: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveSearchRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenDirRequest {
    pub url: String,
}

fn required(value: Option<String>) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required fields".into()))
}

fn required_id(value: Option<i64>) -> Result<i64, ApiError> {
    value
        .filter(|v| *v != 0)
        .ok_or_else(|| ApiError::BadRequest("Missing required fields".into()))
}

fn imported(service: Service) -> Json<JsonValue> {
    Json(json!({
        "success": true,
        "message": format!("Downloaded & Sent to {} for import!", service),
    }))
}

// =============================================================================
// MESSAGING PLATFORM
// =============================================================================

pub async fn messaging_status(State(state): State<AppState>) -> Result<Json<JsonValue>, ApiError> {
    let (connected, channels) = state.messaging.status().await?;
    Ok(Json(json!({ "connected": connected, "channels": channels })))
}

pub async fn messaging_send_code(
    State(state): State<AppState>,
    Json(req): Json<SendCodeRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let phone = required(req.phone)?;
    state.messaging.send_login_code(&phone).await?;
    Ok(Json(json!({ "success": true })))
}

/// Sign in with the code sent by [`messaging_send_code`]. An account with
/// two-step verification and no `password` answers `2FA_NEEDED`.
pub async fn messaging_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let code = required(req.code)?;
    match state
        .messaging
        .complete_login(&code, req.password.as_deref())
        .await?
    {
        LoginOutcome::LoggedIn => Ok(Json(json!({ "success": true }))),
        LoginOutcome::PasswordNeeded => Ok(Json(json!({ "success": false, "error": "2FA_NEEDED" }))),
    }
}

pub async fn messaging_search(
    State(state): State<AppState>,
    Json(req): Json<MessageSearchRequest>,
) -> Result<Json<Vec<MessageHit>>, ApiError> {
    Ok(Json(state.messaging.search(&req.channel, &req.query).await?))
}

/// Download a message's media and hand it to a service for import.
pub async fn messaging_import(
    State(state): State<AppState>,
    Json(req): Json<MessageImportRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let service = required(req.service)?;
    let service_id = required_id(req.service_id)?;
    let channel = required(req.channel)?;
    let message_id = required_id(req.message_id)?;
    let filename = required(req.filename)?;
    let service = parse_service(&service)?;

    info!(service = %service, item_id = service_id, filename = %filename, "Starting message import");
    let target = actions::import_message(
        &state.jobs,
        &state.messaging,
        state.download_root(),
        service,
        service_id,
        &channel,
        message_id,
        &filename,
    )
    .await?;
    info!(file = %target.file.display(), "Message import requested");

    Ok(imported(service))
}

// =============================================================================
// PUBLIC ARCHIVE
// =============================================================================

/// Archive search. Failures yield an empty list.
pub async fn archive_search(
    State(state): State<AppState>,
    Json(req): Json<ArchiveSearchRequest>,
) -> Json<Vec<ArchiveItem>> {
    Json(state.archive.search(&req.query).await.unwrap_or_else(|e| {
        warn!(query = %req.query, error = %e, "Archive search failed");
        Vec::new()
    }))
}

/// Video files of an archive item. Failures yield an empty list.
pub async fn archive_files(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Json<Vec<ArchiveFile>> {
    Json(state.archive.files(&identifier).await.unwrap_or_else(|e| {
        warn!(identifier = %identifier, error = %e, "Archive file listing failed");
        Vec::new()
    }))
}

// =============================================================================
// OPEN DIRECTORIES AND HTTP IMPORT
// =============================================================================

pub async fn opendir_scan(
    State(state): State<AppState>,
    Json(req): Json<OpenDirRequest>,
) -> Result<Json<Vec<OpenDirFile>>, ApiError> {
    Ok(Json(state.opendir.scan(&req.url).await?))
}

/// Download a file over HTTP and hand it to a service for import.
pub async fn http_import(
    State(state): State<AppState>,
    Json(req): Json<HttpImportRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let service = required(req.service)?;
    let service_id = required_id(req.service_id)?;
    let url = required(req.url)?;
    let filename = required(req.filename)?;
    let service = parse_service(&service)?;

    info!(service = %service, item_id = service_id, filename = %filename, "Starting HTTP import");
    let target =
        actions::import_http(&state.jobs, &state.downloader, service, service_id, &url, &filename)
            .await?;
    info!(file = %target.file.display(), "HTTP import requested");

    Ok(imported(service))
}
