//! Host counter collection
//!
//! - CPU, memory and swap through sysinfo
//! - /proc/vmstat for paging, fault and swap counters
//! - /proc/diskstats for cumulative block device I/O

use super::{DiskIoTotals, NodeStatsSource, SystemUsage, VmstatSnapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use sysinfo::System;
use tokio::{fs, task};

/// /proc/diskstats reports sectors in fixed 512-byte units
const DISKSTATS_SECTOR_BYTES: u64 = 512;

/// Node counter source backed by sysinfo and procfs
pub struct ProcfsSource {
    proc_root: PathBuf,
    system: Arc<Mutex<System>>,
}

impl ProcfsSource {
    /// Create a source reading from /proc
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Create source with custom proc root (for testing)
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    /// Parse /proc/vmstat contents ("name value" per line)
    pub fn parse_vmstat(content: &str) -> VmstatSnapshot {
        content
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let name = parts.next()?;
                let value = parts.next()?.parse::<u64>().ok()?;
                if parts.next().is_some() {
                    return None;
                }
                Some((name, value))
            })
            .collect()
    }

    /// Parse /proc/diskstats contents, summing sectors read/written on every line
    pub fn parse_diskstats(content: &str) -> DiskIoTotals {
        let mut totals = DiskIoTotals::default();

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            // major minor name reads merged sectors_read ms writes merged sectors_written ...
            if parts.len() < 10 {
                continue;
            }
            let sectors_read: u64 = parts[5].parse().unwrap_or(0);
            let sectors_written: u64 = parts[9].parse().unwrap_or(0);

            totals.read_bytes = totals
                .read_bytes
                .saturating_add(sectors_read.saturating_mul(DISKSTATS_SECTOR_BYTES));
            totals.write_bytes = totals
                .write_bytes
                .saturating_add(sectors_written.saturating_mul(DISKSTATS_SECTOR_BYTES));
        }

        totals
    }

    async fn read_proc_file(&self, name: &str) -> Result<String> {
        let path = self.proc_root.join(name);
        fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Refresh and read CPU, memory and swap; blocks on procfs
fn read_system_usage(system: &mut System) -> Result<SystemUsage> {
    // CPU usage is measured between consecutive refreshes, so the first
    // call after startup reports 0.
    system.refresh_cpu();
    system.refresh_memory();

    let mem_total_bytes = system.total_memory();
    if mem_total_bytes == 0 {
        anyhow::bail!("Memory counters unavailable");
    }

    let cpu_percent = f64::from(system.global_cpu_info().cpu_usage());

    Ok(SystemUsage {
        cpu_percent: if cpu_percent.is_finite() { cpu_percent } else { 0.0 },
        mem_used_bytes: system.used_memory(),
        mem_total_bytes,
        swap_used_bytes: system.used_swap(),
        swap_total_bytes: system.total_swap(),
    })
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStatsSource for ProcfsSource {
    async fn read_usage(&mut self) -> Result<SystemUsage> {
        let system = Arc::clone(&self.system);
        task::spawn_blocking(move || {
            // A refresh still stuck from an earlier tick keeps the lock
            let mut system = system
                .try_lock()
                .map_err(|_| anyhow::anyhow!("Previous usage read still in progress"))?;
            read_system_usage(&mut system)
        })
        .await
        .context("Usage read task failed")?
    }

    async fn read_vmstat(&mut self) -> Result<VmstatSnapshot> {
        let content = self.read_proc_file("vmstat").await?;
        let snapshot = Self::parse_vmstat(&content);
        if snapshot.is_empty() {
            anyhow::bail!("No counters found in {}/vmstat", self.proc_root.display());
        }
        Ok(snapshot)
    }

    async fn read_disk_io(&mut self) -> Result<DiskIoTotals> {
        let content = self.read_proc_file("diskstats").await?;
        Ok(Self::parse_diskstats(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vmstat() {
        let content = "nr_free_pages 123456
pgpgin 1000
pgpgout 2000
pswpin 30
pswpout 40
pgfault 987654
pgmajfault 12
";

        let snapshot = ProcfsSource::parse_vmstat(content);
        assert_eq!(snapshot.len(), 7);
        assert_eq!(snapshot.get("pgpgin"), Some(1000));
        assert_eq!(snapshot.get("pgmajfault"), Some(12));
        assert_eq!(snapshot.get("missing"), None);
    }

    #[test]
    fn test_parse_vmstat_skips_malformed_lines() {
        let content = "pgfault 10\ngarbage\npswpin notanumber\nthree fields here\n\npgmajfault 2";

        let snapshot = ProcfsSource::parse_vmstat(content);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("pgfault"), Some(10));
        assert_eq!(snapshot.get("pgmajfault"), Some(2));
    }

    #[test]
    fn test_parse_diskstats_sums_devices() {
        let content = "   8       0 sda 1000 10 2048 500 800 20 4096 900 0 1200 1400 0 0 0 0
 259       0 nvme0n1 50 0 100 10 60 0 200 20 0 30 30 0 0 0 0
";

        let totals = ProcfsSource::parse_diskstats(content);
        assert_eq!(totals.read_bytes, (2048 + 100) * 512);
        assert_eq!(totals.write_bytes, (4096 + 200) * 512);
    }

    #[test]
    fn test_parse_diskstats_ignores_short_lines() {
        let totals = ProcfsSource::parse_diskstats("8 0 sda 1 2 3\n");
        assert_eq!(totals, DiskIoTotals::default());
    }

    #[tokio::test]
    async fn test_missing_proc_files_are_errors() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut source = ProcfsSource::with_proc_root(temp_dir.path());

        assert!(source.read_vmstat().await.is_err());
        assert!(source.read_disk_io().await.is_err());
    }

    #[tokio::test]
    async fn test_usage_read_skipped_while_previous_refresh_holds_lock() {
        let mut source = ProcfsSource::new();
        let held = Arc::clone(&source.system);
        let guard = held.lock().unwrap();

        let err = source.read_usage().await.unwrap_err();
        assert!(err.to_string().contains("still in progress"));

        drop(guard);
    }
}
