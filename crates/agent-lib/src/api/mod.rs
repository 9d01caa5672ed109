//! HTTP surfaces of the node collector
//!
//! Two independently bound routers:
//! - query: `/ping`, `/history`, `/stream`, plus `/healthz`, `/readyz`, `/metrics`
//! - ingest: `/events`
//!
//! Handlers only ever take copies out of the histories; nothing holds a
//! lock across a response write.

mod error;
mod ingest;
mod query;
mod stream;

pub use error::ApiError;

use crate::health::HealthRegistry;
use crate::history::HistoryBuffer;
use crate::models::{Event, ResourceSample};
use crate::observability::{CollectorMetrics, StructuredLogger};
use axum::{
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default time between stream frames
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_secs(1);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub samples: HistoryBuffer<ResourceSample>,
    pub events: HistoryBuffer<Event>,
    pub health_registry: HealthRegistry,
    pub metrics: CollectorMetrics,
    pub logger: StructuredLogger,
    pub stream_interval: Duration,
    active_streams: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        samples: HistoryBuffer<ResourceSample>,
        events: HistoryBuffer<Event>,
        health_registry: HealthRegistry,
        metrics: CollectorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            samples,
            events,
            health_registry,
            metrics,
            logger,
            stream_interval: DEFAULT_STREAM_INTERVAL,
            active_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the time between stream frames (normally the sampling interval)
    pub fn with_stream_interval(mut self, interval: Duration) -> Self {
        self.stream_interval = interval;
        self
    }

    /// Number of stream connections currently open
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }
}

/// Which history a query or stream reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Periodic resource samples
    Stats,
    /// Ingested external events
    Events,
}

impl Scope {
    /// Resolve the `scope` query parameter; absent or empty means events
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw.unwrap_or_default() {
            "" | "events" => Ok(Scope::Events),
            "stats" => Ok(Scope::Stats),
            other => Err(ApiError::InvalidScope(other.to_string())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub scope: Option<String>,
}

/// Create the query router
pub fn query_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(query::ping))
        .route("/history", get(query::history))
        .route("/stream", get(stream::stream))
        .route("/healthz", get(query::healthz))
        .route("/readyz", get(query::readyz))
        .route("/metrics", get(query::metrics))
        .with_state(state)
}

/// Create the ingest router
pub fn ingest_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/events", post(ingest::ingest_event))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_resolution() {
        assert_eq!(Scope::parse(None).unwrap(), Scope::Events);
        assert_eq!(Scope::parse(Some("")).unwrap(), Scope::Events);
        assert_eq!(Scope::parse(Some("events")).unwrap(), Scope::Events);
        assert_eq!(Scope::parse(Some("stats")).unwrap(), Scope::Stats);
    }

    #[test]
    fn test_unknown_scope_rejected() {
        let err = Scope::parse(Some("STATS")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidScope(ref s) if s == "STATS"));
    }
}
