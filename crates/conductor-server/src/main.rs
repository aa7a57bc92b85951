//! Conductor HTTP server entrypoint
//!
//! Loads configuration, builds the scheduler and its provider adapters,
//! starts the worker task, and serves the OpenAI-compatible HTTP surface.
//! The actual router/scheduler construction lives in the library crate so
//! integration tests can exercise it without a bound socket.

use std::sync::Arc;

use conductor_server::config::{self, EnvOverrides};
use conductor_server::state::AppState;
use conductor_server::{build_router, build_scheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env = EnvOverrides::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| env.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(config_path = %env.config_path, "loading conductor configuration");
    let raw_config = config::load_config(&env.config_path)?;

    let (scheduler, model_map) = build_scheduler(&raw_config);
    scheduler.start();

    let state = AppState {
        scheduler: Arc::new(scheduler),
        model_map: Arc::new(model_map),
    };

    let app = build_router(state.clone());

    let addr = format!("{}:{}", env.host, env.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "conductor server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.scheduler.stop().await;
    Ok(())
}
