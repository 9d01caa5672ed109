//! Node sampling loop
//!
//! Produces exactly one `ResourceSample` per interval. The loop paces itself
//! by subtracting the time spent collecting from the interval, and never
//! stops: counter read failures degrade the affected fields instead.

use super::{DiskIoTotals, NodeStatsSource, SystemUsage, VmstatRates, VmstatSnapshot};
use crate::health::{components, HealthRegistry};
use crate::history::HistoryBuffer;
use crate::models::ResourceSample;
use crate::observability::{buffers, CollectorMetrics, StructuredLogger};
use anyhow::Result;
use std::time::Duration;
use tokio::time::{error::Elapsed, sleep, timeout, Instant};
use tracing::{debug, info};

mod sources {
    pub const USAGE: &str = "usage";
    pub const VMSTAT: &str = "vmstat";
    pub const DISK: &str = "diskstats";
}

/// Configuration for the sampling loop
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Time between samples (default: 1 second)
    pub interval: Duration,
    /// Upper bound on a single counter read (default: the interval)
    pub read_timeout: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Vmstat counters from the previous tick
struct PreviousCounters {
    snapshot: VmstatSnapshot,
    taken_at: Instant,
}

/// Periodic sampler feeding the stats history
pub struct Sampler {
    source: Box<dyn NodeStatsSource>,
    history: HistoryBuffer<ResourceSample>,
    health: HealthRegistry,
    metrics: CollectorMetrics,
    logger: StructuredLogger,
    config: SamplerConfig,
    previous: Option<PreviousCounters>,
    last_disk: DiskIoTotals,
    degraded: bool,
}

impl Sampler {
    pub fn new(
        source: Box<dyn NodeStatsSource>,
        history: HistoryBuffer<ResourceSample>,
        health: HealthRegistry,
        metrics: CollectorMetrics,
        logger: StructuredLogger,
        config: SamplerConfig,
    ) -> Self {
        Self {
            source,
            history,
            health,
            metrics,
            logger,
            config,
            previous: None,
            last_disk: DiskIoTotals::default(),
            degraded: false,
        }
    }

    /// Run forever, one sample per interval
    pub async fn run(mut self) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            capacity = self.history.capacity(),
            "Starting node sampler"
        );

        loop {
            let started = Instant::now();
            self.sample_once().await;
            let elapsed = started.elapsed();

            self.metrics.observe_sample_latency(elapsed.as_secs_f64());

            match self.config.interval.checked_sub(elapsed) {
                Some(remaining) if !remaining.is_zero() => sleep(remaining).await,
                _ => debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Sampling overran interval, starting next tick immediately"
                ),
            }
        }
    }

    /// Take one sample and append it to the history
    pub async fn sample_once(&mut self) -> ResourceSample {
        let mut failures: Vec<&'static str> = Vec::new();

        let read_timeout = self.config.read_timeout;

        let result = timeout(read_timeout, self.source.read_usage()).await;
        let usage = match self.settle(sources::USAGE, result) {
            Some(usage) => usage,
            None => {
                failures.push(sources::USAGE);
                SystemUsage::default()
            }
        };

        let result = timeout(read_timeout, self.source.read_disk_io()).await;
        match self.settle(sources::DISK, result) {
            Some(disk) => self.last_disk = disk,
            None => failures.push(sources::DISK),
        }

        let result = timeout(read_timeout, self.source.read_vmstat()).await;
        let rates = match self.settle(sources::VMSTAT, result) {
            Some(current) => {
                let taken_at = Instant::now();
                let rates = match &self.previous {
                    Some(prev) => VmstatRates::between(
                        &prev.snapshot,
                        &current,
                        taken_at.duration_since(prev.taken_at),
                    ),
                    None => VmstatRates::default(),
                };
                self.previous = Some(PreviousCounters {
                    snapshot: current,
                    taken_at,
                });
                rates
            }
            None => {
                failures.push(sources::VMSTAT);
                VmstatRates::default()
            }
        };

        let sample = ResourceSample {
            timestamp: chrono::Utc::now(),
            cpu_percent: usage.cpu_percent,
            mem_used_mb: usage.mem_used_mb(),
            mem_total_mb: usage.mem_total_mb(),
            swap_used_mb: usage.swap_used_mb(),
            swap_total_mb: usage.swap_total_mb(),
            pswpin: rates.pswpin,
            pswpout: rates.pswpout,
            pgfault: rates.pgfault,
            pgmajfault: rates.pgmajfault,
            pgpgin: rates.pgpgin,
            pgpgout: rates.pgpgout,
            disk_read_bytes: self.last_disk.read_bytes,
            disk_write_bytes: self.last_disk.write_bytes,
        };

        self.history.append(sample.clone()).await;
        self.metrics.inc_samples();
        self.metrics
            .set_history_items(buffers::STATS, self.history.len().await);
        self.update_health(&failures).await;

        sample
    }

    /// Resolve a timed counter read, logging and counting failures
    fn settle<T>(&self, source_name: &str, result: Result<Result<T>, Elapsed>) -> Option<T> {
        let result = result.unwrap_or_else(|_| {
            Err(anyhow::anyhow!(
                "Read timed out after {}ms",
                self.config.read_timeout.as_millis()
            ))
        });

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.logger.log_counter_read_failure(source_name, &e);
                self.metrics.inc_counter_read_errors(source_name);
                None
            }
        }
    }

    async fn update_health(&mut self, failures: &[&str]) {
        if !failures.is_empty() {
            self.health
                .set_degraded(
                    components::SAMPLER,
                    format!("Unreadable counters: {}", failures.join(", ")),
                )
                .await;
            self.degraded = true;
        } else if self.degraded {
            info!("All node counters readable again");
            self.health.set_healthy(components::SAMPLER).await;
            self.degraded = false;
        }
    }
}

/// Builder for creating the sampler
pub struct SamplerBuilder {
    source: Option<Box<dyn NodeStatsSource>>,
    history: Option<HistoryBuffer<ResourceSample>>,
    health: Option<HealthRegistry>,
    metrics: Option<CollectorMetrics>,
    logger: Option<StructuredLogger>,
    config: SamplerConfig,
}

impl SamplerBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            history: None,
            health: None,
            metrics: None,
            logger: None,
            config: SamplerConfig::default(),
        }
    }

    /// Set the counter source
    pub fn source(mut self, source: Box<dyn NodeStatsSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the history the samples are appended to
    pub fn history(mut self, history: HistoryBuffer<ResourceSample>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn metrics(mut self, metrics: CollectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the sampling interval; the read timeout follows it
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self.config.read_timeout = interval;
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.config.read_timeout = read_timeout;
        self
    }

    pub fn build(self) -> Result<Sampler> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Counter source is required"))?;
        let history = self
            .history
            .ok_or_else(|| anyhow::anyhow!("History buffer is required"))?;

        Ok(Sampler::new(
            source,
            history,
            self.health.unwrap_or_default(),
            self.metrics.unwrap_or_default(),
            self.logger
                .unwrap_or_else(|| StructuredLogger::new("unknown")),
            self.config,
        ))
    }
}

impl Default for SamplerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
