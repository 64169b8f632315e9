//! Application entry point for the `plantwatch` service.
//!
//! This binary orchestrates the full startup sequence, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the measurement store and creating its schema if missing
//! - Starting the cron-driven poll scheduler
//! - Mounting all routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! See [`plantwatch::config::load_from_env`] for the service settings, plus:
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use plantwatch::device::{HttpGateway, SensorDevice};
use plantwatch::ingest::Timeouts;
use plantwatch::scheduler::PollScheduler;
use plantwatch::store::{MeasurementStore, MemoryStore, PgStore};
use plantwatch::{config, routes, AppState, Config};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let store = open_store(&cfg).await?;
    store
        .initialize()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create schema: {}", e))?;

    let device: Arc<dyn SensorDevice> = Arc::new(
        HttpGateway::new(&cfg.gateway_url, &cfg.sensor_address, cfg.device_timeout)
            .map_err(|e| anyhow::anyhow!("Failed to build gateway client: {}", e))?,
    );

    let timeouts = Timeouts {
        device: cfg.device_timeout,
        store: cfg.db_timeout,
    };
    let state = AppState::new(store, device, &cfg.sensor_address, timeouts);

    let scheduled = state.clone();
    let _scheduler = PollScheduler::new(cfg.poll_schedule.clone()).spawn(move || {
        let state = scheduled.clone();
        async move {
            if let Err(e) = state.poll().await {
                tracing::error!("Scheduled poll failed: {}", e);
            }
        }
    });

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Open the store named by `DATABASE_URL`.
async fn open_store(cfg: &Config) -> Result<Arc<dyn MeasurementStore>> {
    // ---
    if cfg.uses_memory_store() {
        tracing::warn!("Using in-memory store; measurements are lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }

    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .acquire_timeout(cfg.db_timeout)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");
    Ok(Arc::new(PgStore::new(pool)))
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `AXUM_LOG_LEVEL` env var
///
/// Call once at startup, before any logging or tracing macros run.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
