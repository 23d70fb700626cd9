use clap::Parser;
use std::time::Duration;

const MIN_WORKERS: usize = 2;
const MAX_WORKERS: usize = 6;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct QueueConfig {
	#[arg(long, env = "WORKER_COUNT", help = "Fixed worker count; defaults to a CPU-based clamp when absent")]
	pub worker_count: Option<usize>,

	#[arg(
        long = "scan-interval-secs",
        env = "SCAN_INTERVAL_SECS",
        default_value = "10",
        value_parser = parse_duration,
        help = "Interval between queue reconciliation scans in seconds"
    )]
	pub scan_interval: Duration,

	#[arg(long, env = "SCAN_LIMIT", default_value = "100", help = "Maximum pending jobs re-enqueued per scan")]
	pub scan_limit: i64,

	#[arg(
        long,
        env = "SHUTDOWN_GRACE_SECS",
        default_value = "20",
        value_parser = parse_duration,
        help = "Deadline for workers to acknowledge shutdown in seconds"
    )]
	pub shutdown_grace: Duration,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			worker_count: None,
			scan_interval: Duration::from_secs(10),
			scan_limit: 100,
			shutdown_grace: Duration::from_secs(20),
		}
	}
}

impl QueueConfig {
	/// Configured count, or `clamp(2, 6, cpus)` when none is given.
	#[must_use]
	pub fn resolved_worker_count(&self) -> usize {
		self.worker_count.unwrap_or_else(|| num_cpus::get().clamp(MIN_WORKERS, MAX_WORKERS))
	}

	#[must_use]
	pub fn test() -> Self {
		Self {
			worker_count: Some(2),
			scan_interval: Duration::from_millis(100),
			scan_limit: 10,
			shutdown_grace: Duration::from_secs(2),
		}
	}
}

fn parse_duration(s: &str) -> Result<Duration, std::num::ParseIntError> {
	s.parse::<u64>().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config() {
		let config = QueueConfig::default();
		assert_eq!(config.scan_interval, Duration::from_secs(10));
		assert_eq!(config.scan_limit, 100);
		assert!(config.worker_count.is_none());
	}

	#[test]
	fn worker_count_resolution_stays_in_bounds() {
		let fixed = QueueConfig {
			worker_count: Some(12),
			..QueueConfig::default()
		};
		assert_eq!(fixed.resolved_worker_count(), 12);

		let derived = QueueConfig::default().resolved_worker_count();
		assert!((MIN_WORKERS..=MAX_WORKERS).contains(&derived));
	}

	#[test]
	fn config_parses_from_args() {
		let config = QueueConfig::try_parse_from(["queue", "--worker-count", "4", "--scan-interval-secs", "5"]).unwrap();
		assert_eq!(config.worker_count, Some(4));
		assert_eq!(config.scan_interval, Duration::from_secs(5));
	}
}
