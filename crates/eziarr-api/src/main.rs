use std::net::SocketAddr;
use std::path::Path;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use eziarr_api::{router, AppState};
use eziarr_core::defaults;
use eziarr_db::Database;
use eziarr_jobs::{JobContext, Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DATABASE_URL.to_string());
    let db = Database::connect(&database_url).await?;
    db.migrate().await?;
    db.settings.seed_defaults().await?;
    info!(database_url = %database_url, "Database ready");

    let services = eziarr_arr::media_services_from_env()?;
    let jobs = JobContext::from_database(&db, services);
    let scheduler_config = SchedulerConfig::from_env();
    let state = AppState::from_env(&db, jobs.clone(), scheduler_config.download_dir.clone())?;

    let scheduler = Scheduler::new(jobs, scheduler_config)
        .with_change_notify(db.settings.change_notify())
        .start();

    let addr = bind_address()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped; draining scheduler");
    scheduler.shutdown().await?;
    Ok(())
}

/// `HOST` (default all interfaces) and `PORT`.
fn bind_address() -> anyhow::Result<SocketAddr> {
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port = match std::env::var("PORT") {
        Ok(raw) => raw.parse::<u16>()?,
        Err(_) => defaults::SERVER_PORT,
    };
    Ok(format!("{host}:{port}").parse()?)
}

const DEFAULT_LOG_FILTER: &str = "eziarr_api=debug,eziarr_jobs=debug,tower_http=info";

/// Install the global subscriber.
///
/// `RUST_LOG` filters, `LOG_FORMAT=json` switches to JSON lines, `LOG_FILE`
/// writes to a daily-rotated file instead of stdout and `LOG_ANSI` forces
/// colors on or off. The returned guard must outlive the program when a file
/// is in use.
fn init_tracing() -> Option<WorkerGuard> {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let ansi = std::env::var("LOG_ANSI").ok().map(|v| v == "true" || v == "1");
    let log_file = std::env::var("LOG_FILE").ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let (layer, guard) = match log_file.as_deref().map(Path::new) {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path.file_name().unwrap_or("eziarr-api.log".as_ref());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            let layer = if json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(ansi.unwrap_or(false))
                    .boxed()
            };
            (layer, Some(guard))
        }
        None if json => (fmt::layer().json().boxed(), None),
        None => {
            let mut layer = fmt::layer();
            if let Some(ansi) = ansi {
                layer = layer.with_ansi(ansi);
            }
            (layer.boxed(), None)
        }
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
    info!(
        format = if json { "json" } else { "text" },
        file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
