//! Live push stream of the newest history entry
//!
//! Each connection gets a pump task that wakes on every interval tick and
//! forwards the newest entry as one `data: <json>` frame. Ticks that find the
//! history empty send nothing. The response stream holds a drop guard on the
//! pump's cancellation token, so a client disconnect stops the pump.

use super::{ApiError, AppState, Scope, ScopeQuery};
use crate::history::HistoryBuffer;
use crate::observability::CollectorMetrics;
use axum::{
    extract::{Query, State},
    response::sse::{Event as SseEvent, Sse},
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Frames buffered per client before the pump waits on it
const STREAM_CHANNEL_CAPACITY: usize = 8;

pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScopeQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let scope = Scope::parse(params.scope.as_deref())?;

    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let pump = Pump {
        interval: state.stream_interval,
        tx,
        cancel: cancel.clone(),
        metrics: state.metrics.clone(),
        _active: ActiveStream::open(&state),
    };

    match scope {
        Scope::Stats => tokio::spawn(pump.run(state.samples.clone())),
        Scope::Events => tokio::spawn(pump.run(state.events.clone())),
    };

    let guard = cancel.drop_guard();
    let frames = ReceiverStream::new(rx).map(move |frame| {
        let _guard = &guard;
        Ok::<_, Infallible>(frame)
    });

    Ok(Sse::new(frames))
}

/// Per-connection task forwarding the newest entry on every tick
struct Pump {
    interval: Duration,
    tx: mpsc::Sender<SseEvent>,
    cancel: CancellationToken,
    metrics: CollectorMetrics,
    _active: ActiveStream,
}

impl Pump {
    async fn run<T>(self, history: HistoryBuffer<T>)
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(latest) = history.latest().await else {
                        continue;
                    };

                    let frame = match SseEvent::default().json_data(&latest) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode stream frame");
                            self.metrics.inc_encode_failures();
                            continue;
                        }
                    };

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        sent = self.tx.send(frame) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        debug!("Stream client disconnected");
    }
}

/// Counts an open stream for as long as its pump lives
struct ActiveStream {
    count: Arc<AtomicUsize>,
    metrics: CollectorMetrics,
}

impl ActiveStream {
    fn open(state: &AppState) -> Self {
        state.active_streams.fetch_add(1, Ordering::SeqCst);
        state.metrics.inc_active_streams();
        Self {
            count: Arc::clone(&state.active_streams),
            metrics: state.metrics.clone(),
        }
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        self.metrics.dec_active_streams();
    }
}
