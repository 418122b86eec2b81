use anyhow::Context;
use asis_core::config::LifecycleConfig;
use asis_server::{app_with_state, state::AppState};
use asis_session::{IntervalScheduler, Sweeper};
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = LifecycleConfig::from_env()?;
    let state = AppState::in_memory(&config)?;

    let sweeper = Sweeper::spawn(state.manager.clone(), IntervalScheduler::new(config.sweep.interval()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(
        %addr,
        ring_capacity = config.retention.ring_capacity,
        ttl_secs = config.retention.ttl_secs,
        sweep_secs = config.sweep.interval_secs,
        "asis server listening"
    );

    axum::serve(listener, app_with_state(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    sweeper.abort();
    Ok(())
}
