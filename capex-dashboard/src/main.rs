//! capex-dashboard service entry point.

use std::time::Duration;

use anyhow::{Context, Result};
use capex_common::config::Config;
use capex_common::logging::init_logging;
use capex_dashboard::{build_router, AppState, Artifacts};
use tower_http::cors::{Any, CorsLayer};

/// How often idle sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = Config::load_with_env()?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("CapEx Dashboard v{}", env!("CARGO_PKG_VERSION"));

    config.validate().context("Invalid configuration")?;

    // Artifacts are loaded once; a bad artifact stops startup.
    let artifacts = Artifacts::load(&config.artifacts).context("Failed to load artifacts")?;

    let addr = config.bind_address();
    let state = AppState::new(config, artifacts);

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "Expired sessions removed");
            }
        }
    });

    // Build router with CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state).layer(cors);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
}
