//! Docker metrics agent
//!
//! Polls the local Docker socket for the runtime version, the running
//! container list, and per-container stats, then emits one normalized
//! JSON record per container per cycle to stdout.

use agent_lib::{DockerStatsSource, JsonLineEmitter, PollConfig, PollLoop, StatsSource};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Tracing goes to stderr so records on stdout stay machine-readable
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("starting docker-metrics-agent");

    let config = config::AgentConfig::load()?;
    info!(hostname = %config.hostname, "agent configured");

    let docker = DockerStatsSource::connect(&config.docker_endpoint)?;
    info!(endpoint = %docker.endpoint(), "connected to Docker daemon");
    let source: Arc<dyn StatsSource> = Arc::new(docker);

    let poll_config = PollConfig {
        interval: Duration::from_secs(config.poll_interval_secs),
        ..Default::default()
    };
    let (poll_loop, records_rx) = PollLoop::new(Arc::clone(&source), &config.hostname, poll_config);

    let emitter = JsonLineEmitter::new(tokio::io::stdout());
    let emitter_handle = tokio::spawn(emitter.run(records_rx));

    if config.oneshot {
        let results = poll_loop.run_once().await?;
        info!(
            sampled = results.sampled,
            unavailable = results.unavailable,
            "oneshot cycle complete"
        );
        // Dropping the loop closes the record channel
        drop(poll_loop);
        emitter_handle.await??;
        return Ok(());
    }

    let app_state = Arc::new(api::AppState::new(Arc::clone(&source)));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let poll_handle = tokio::spawn(poll_loop.run(shutdown_tx.subscribe()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(());
    poll_handle.await?;
    emitter_handle.await??;
    api_handle.abort();

    Ok(())
}
