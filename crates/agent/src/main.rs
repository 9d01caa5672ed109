//! Node Collector - per-node resource telemetry agent
//!
//! This binary runs as a DaemonSet on each Kubernetes node, sampling node
//! counters once per interval and serving the recent history to readers.

use agent_lib::{
    api::{ingest_router, query_router, AppState},
    collector::{ProcfsSource, SamplerBuilder},
    health::{components, HealthRegistry},
    observability::{CollectorMetrics, StructuredLogger},
    HistoryBuffer,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const COLLECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting node-collector");

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        interval_ms = config.sample_interval_ms,
        capacity = config.history_capacity,
        "Collector configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SAMPLER).await;
    health_registry.register(components::QUERY).await;
    health_registry.register(components::INGEST).await;

    let metrics = CollectorMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let samples = HistoryBuffer::new(config.history_capacity);
    let events = HistoryBuffer::new(config.history_capacity);

    let sampler = SamplerBuilder::new()
        .source(Box::new(ProcfsSource::with_proc_root(&config.proc_root)))
        .history(samples.clone())
        .health(health_registry.clone())
        .metrics(metrics.clone())
        .logger(logger.clone())
        .interval(config.sample_interval())
        .build()?;
    tokio::spawn(sampler.run());

    let app_state = Arc::new(
        AppState::new(
            samples,
            events,
            health_registry.clone(),
            metrics,
            logger.clone(),
        )
        .with_stream_interval(config.sample_interval()),
    );

    let query_listener = api::bind(config.query_port).await?;
    let ingest_listener = api::bind(config.ingest_port).await?;

    let mut query_server = tokio::spawn(api::serve(
        components::QUERY,
        query_listener,
        query_router(app_state.clone()),
    ));
    let mut ingest_server = tokio::spawn(api::serve(
        components::INGEST,
        ingest_listener,
        ingest_router(app_state),
    ));

    logger.log_startup(COLLECTOR_VERSION, config.query_port, config.ingest_port);
    health_registry.set_ready(true).await;

    // Run until interrupted or until either surface stops serving
    let (surface, outcome) = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
            return Ok(());
        }
        outcome = &mut query_server => (components::QUERY, outcome),
        outcome = &mut ingest_server => (components::INGEST, outcome),
    };

    let err = match outcome {
        Ok(Ok(())) => anyhow::anyhow!("{} server stopped unexpectedly", surface),
        Ok(Err(e)) => e,
        Err(e) => anyhow::anyhow!("{} server task failed: {}", surface, e),
    };
    error!(surface = surface, error = %format!("{err:#}"), "API server exited");
    health_registry
        .set_unhealthy(surface, err.to_string())
        .await;
    logger.log_shutdown("API server exited");

    Err(err)
}
