//! Node resource sampling
//!
//! This module reads node-wide counters (CPU, memory, swap, vmstat paging
//! counters, block device I/O) and turns them into one `ResourceSample` per
//! sampling interval. Reading the OS is behind the `NodeStatsSource` trait so
//! the sampler can be driven by synthetic counters in tests.

mod procfs;
mod rates;
mod sampler;


pub use procfs::ProcfsSource;
pub use rates::{rate_per_sec, VmstatRates};
pub use sampler::{Sampler, SamplerBuilder, SamplerConfig};

use anyhow::Result;
use std::collections::HashMap;

pub use async_trait::async_trait;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Instantaneous CPU, memory and swap usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemUsage {
    pub cpu_percent: f64,
    pub mem_used_bytes: u64,
    pub mem_total_bytes: u64,
    pub swap_used_bytes: u64,
    pub swap_total_bytes: u64,
}

impl SystemUsage {
    pub fn mem_used_mb(&self) -> u64 {
        self.mem_used_bytes / BYTES_PER_MB
    }

    pub fn mem_total_mb(&self) -> u64 {
        self.mem_total_bytes / BYTES_PER_MB
    }

    pub fn swap_used_mb(&self) -> u64 {
        self.swap_used_bytes / BYTES_PER_MB
    }

    pub fn swap_total_mb(&self) -> u64 {
        self.swap_total_bytes / BYTES_PER_MB
    }
}

/// Labelled snapshot of the monotonic kernel counters in /proc/vmstat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmstatSnapshot {
    values: HashMap<String, u64>,
}

impl VmstatSnapshot {
    pub fn get(&self, key: &str) -> Option<u64> {
        self.values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for VmstatSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Cumulative block device I/O since boot, summed over all devices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskIoTotals {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Source of raw node counters
///
/// Each read is independent: a failure in one must not prevent the others.
#[async_trait]
pub trait NodeStatsSource: Send {
    /// Current CPU utilisation and memory/swap occupancy
    async fn read_usage(&mut self) -> Result<SystemUsage>;

    /// Current values of all vmstat counters
    async fn read_vmstat(&mut self) -> Result<VmstatSnapshot>;

    /// Cumulative disk read/write bytes
    async fn read_disk_io(&mut self) -> Result<DiskIoTotals>;
}
