//! Node collector library
//!
//! This crate provides the core functionality for:
//! - Periodic sampling of node resource counters
//! - Bounded in-memory histories of samples and external events
//! - HTTP query, streaming and ingestion surfaces
//! - Health checks and observability

pub mod api;
pub mod collector;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
pub use models::*;
pub use observability::{CollectorMetrics, StructuredLogger};
