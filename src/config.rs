use anyhow::{bail, Result};
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_TRIAL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_FALSE_POSITIVE_MARKER: &str = "HTTP 401";

/// Run settings, built once and shared read-only with every worker.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Upper bound on workers; the pool never exceeds the endpoint count.
    pub workers: usize,
    pub probe_timeout: Duration,
    pub trial_timeout: Duration,
    /// Idle wait between empty queue polls, and the controller's drain check period.
    pub poll_interval: Duration,
    pub false_positive_markers: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            trial_timeout: DEFAULT_TRIAL_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            false_positive_markers: vec![DEFAULT_FALSE_POSITIVE_MARKER.to_string()],
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("worker count must be at least 1");
        }
        if self.probe_timeout.is_zero() || self.trial_timeout.is_zero() {
            bail!("timeouts must be greater than zero");
        }
        if self.poll_interval.is_zero() {
            bail!("poll interval must be greater than zero");
        }
        if self.false_positive_markers.iter().any(|m| m.is_empty()) {
            bail!("false-positive markers must not be empty strings");
        }
        Ok(())
    }

    /// Number of workers actually started for `endpoints` targets.
    pub fn pool_size(&self, endpoints: usize) -> usize {
        self.workers.min(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ScanConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.workers, 10);
        assert_eq!(cfg.false_positive_markers, vec!["HTTP 401".to_string()]);
    }

    #[test]
    fn pool_size_is_clamped_to_endpoints() {
        let cfg = ScanConfig::default();
        assert_eq!(cfg.pool_size(3), 3);
        assert_eq!(cfg.pool_size(50), 10);
        assert_eq!(cfg.pool_size(0), 0);
    }

    #[test]
    fn rejects_zero_workers_and_empty_marker() {
        let cfg = ScanConfig { workers: 0, ..ScanConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = ScanConfig {
            false_positive_markers: vec![String::new()],
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
