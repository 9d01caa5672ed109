//! Event ingestion
//!
//! The only write path into the event history. Producers (kernel tracers)
//! post one JSON object per event.

use super::{ApiError, AppState};
use crate::models::Event;
use crate::observability::buffers;
use axum::{body::Bytes, extract::State, http::StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let event = match decode_event(&body) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "Rejected event");
            state.metrics.inc_events_rejected();
            return Err(e);
        }
    };

    state.logger.log_event_ingested(&event.kind_label());
    state.events.append(event).await;
    state.metrics.inc_events_ingested();
    state
        .metrics
        .set_history_items(buffers::EVENTS, state.events.len().await);

    Ok(StatusCode::NO_CONTENT)
}

fn decode_event(body: &[u8]) -> Result<Event, ApiError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::MalformedJson(e.to_string()))?;
    Ok(Event::from_value(value, chrono::Utc::now())?)
}
