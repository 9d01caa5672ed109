//! Per-second rates derived from monotonic vmstat counters

use super::VmstatSnapshot;
use std::time::Duration;

/// Per-second paging, fault and swap rates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmstatRates {
    pub pswpin: u64,
    pub pswpout: u64,
    pub pgfault: u64,
    pub pgmajfault: u64,
    pub pgpgin: u64,
    pub pgpgout: u64,
}

impl VmstatRates {
    /// Rates between two snapshots taken `elapsed` apart
    ///
    /// A counter missing from either snapshot yields 0.
    pub fn between(previous: &VmstatSnapshot, current: &VmstatSnapshot, elapsed: Duration) -> Self {
        let rate = |key: &str| match (previous.get(key), current.get(key)) {
            (Some(prev), Some(cur)) => rate_per_sec(prev, cur, elapsed),
            _ => 0,
        };

        Self {
            pswpin: rate("pswpin"),
            pswpout: rate("pswpout"),
            pgfault: rate("pgfault"),
            pgmajfault: rate("pgmajfault"),
            pgpgin: rate("pgpgin"),
            pgpgout: rate("pgpgout"),
        }
    }
}

/// `round((current - previous) / elapsed_seconds)`
///
/// A counter that went backwards (reset or wrap) yields 0, as does a zero elapsed time.
pub fn rate_per_sec(previous: u64, current: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 || current < previous {
        return 0;
    }
    ((current - previous) as f64 / secs).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_per_sec_basic() {
        assert_eq!(rate_per_sec(100, 160, Duration::from_secs(1)), 60);
    }

    #[test]
    fn test_rate_per_sec_clamps_decrease() {
        assert_eq!(rate_per_sec(200, 150, Duration::from_secs(1)), 0);
    }

    #[test]
    fn test_rate_per_sec_rounds() {
        // 25 over 2s = 12.5 -> 13
        assert_eq!(rate_per_sec(0, 25, Duration::from_secs(2)), 13);
        // 10 over 1.5s = 6.67 -> 7
        assert_eq!(rate_per_sec(0, 10, Duration::from_millis(1500)), 7);
    }

    #[test]
    fn test_rate_per_sec_zero_elapsed() {
        assert_eq!(rate_per_sec(0, 10, Duration::ZERO), 0);
    }

    #[test]
    fn test_rates_between_snapshots() {
        let previous: VmstatSnapshot = [
            ("pswpin", 10),
            ("pswpout", 20),
            ("pgfault", 1000),
            ("pgmajfault", 5),
            ("pgpgin", 300),
            ("pgpgout", 400),
        ]
        .into_iter()
        .collect();
        let current: VmstatSnapshot = [
            ("pswpin", 14),
            ("pswpout", 20),
            ("pgfault", 1600),
            ("pgmajfault", 3),
            ("pgpgin", 500),
        ]
        .into_iter()
        .collect();

        let rates = VmstatRates::between(&previous, &current, Duration::from_secs(2));

        assert_eq!(rates.pswpin, 2);
        assert_eq!(rates.pswpout, 0);
        assert_eq!(rates.pgfault, 300);
        assert_eq!(rates.pgmajfault, 0);
        assert_eq!(rates.pgpgin, 100);
        // missing from current
        assert_eq!(rates.pgpgout, 0);
    }
}
