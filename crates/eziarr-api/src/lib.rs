//! # eziarr-api
//!
//! HTTP surface of eziarr. Every route lives under `/api/v1`; failures are
//! rendered as `{success: false, error}` and unknown routes answer 404.
//!
//! ```rust,ignore
//! let state = AppState::from_env(&db, jobs, "downloads")?;
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, eziarr_api::router(state)).await?;
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use handlers::{library, settings, sources};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1", get(library::health))
        // Library
        .route("/api/v1/missing", get(library::list_missing))
        .route("/api/v1/search", post(library::trigger_search))
        .route("/api/v1/unmonitor", post(library::unmonitor))
        .route("/api/v1/deepsearch", post(library::deep_search))
        .route("/api/v1/forcegrab", post(library::force_grab))
        // Settings
        .route(
            "/api/v1/settings",
            get(settings::get_settings).post(settings::set_setting),
        )
        .route("/api/v1/settings/batch", post(settings::set_settings_batch))
        // Alternative sources
        .route("/api/v1/telegram/status", get(sources::messaging_status))
        .route("/api/v1/telegram/auth/send-code", post(sources::messaging_send_code))
        .route("/api/v1/telegram/auth/login", post(sources::messaging_login))
        .route("/api/v1/telegram/search", post(sources::messaging_search))
        .route("/api/v1/telegram/import", post(sources::messaging_import))
        .route("/api/v1/ia/search", post(sources::archive_search))
        .route("/api/v1/ia/files/:identifier", get(sources::archive_files))
        .route("/api/v1/opendir/scan", post(sources::opendir_scan))
        .route("/api/v1/import/http", post(sources::http_import))
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("API Route Not Found".into())
}

/// CORS from `ALLOWED_ORIGINS` (comma separated); any origin when unset.
fn cors_layer() -> CorsLayer {
    let origins = parse_allowed_origins();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers(Any)
}

fn parse_allowed_origins() -> Vec<HeaderValue> {
    std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}
