use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use task_queue::QueueConfig;

#[derive(Parser, Clone, Debug)]
#[command(name = "scriberr")]
#[command(about = "Self-hosted audio transcription service", long_about = None)]
pub struct Config {
	/// Listen address for the HTTP server
	#[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8080")]
	pub listen_addr: String,

	/// SQLite database URL
	#[arg(long, env = "DATABASE_URL", default_value = "sqlite://scriberr.db?mode=rwc")]
	pub database_url: String,

	/// Root directory for uploads, merged audio, batch artifacts, and
	/// model environments
	#[arg(long, env = "DATA_ROOT", default_value = "./data")]
	pub data_root: PathBuf,

	/// Fixed worker count; defaults to a CPU-based clamp
	#[arg(long, env = "WORKER_COUNT")]
	pub worker_count: Option<usize>,

	/// Interval between queue reconciliation scans in seconds
	#[arg(long, env = "SCAN_INTERVAL_SECS", default_value = "10", value_parser = parse_duration)]
	pub scan_interval: Duration,

	/// Deadline for workers to acknowledge shutdown in seconds
	#[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value = "20", value_parser = parse_duration)]
	pub shutdown_grace: Duration,

	/// Webhook delivery attempts before abandoning a notification
	#[arg(long, env = "WEBHOOK_ATTEMPTS", default_value = "3")]
	pub webhook_attempts: u32,

	/// Base of the linear webhook retry backoff in seconds
	#[arg(long, env = "WEBHOOK_BACKOFF_SECS", default_value = "2", value_parser = parse_duration)]
	pub webhook_backoff: Duration,

	/// Per-subscriber SSE buffer; overflow drops events for that subscriber
	#[arg(long, env = "SSE_BUFFER", default_value = "32")]
	pub sse_buffer: usize,

	/// Emit logs as JSON
	#[arg(long, env = "LOG_JSON", default_value = "false")]
	pub log_json: bool,
}

impl Config {
	pub fn validate(&self) -> Result<(), String> {
		if let Some(count) = self.worker_count {
			if count == 0 {
				return Err("WORKER_COUNT must be at least 1".to_string());
			}
		}
		if self.webhook_attempts == 0 {
			return Err("WEBHOOK_ATTEMPTS must be at least 1".to_string());
		}
		if self.sse_buffer == 0 {
			return Err("SSE_BUFFER must be at least 1".to_string());
		}
		if self.listen_addr.is_empty() {
			return Err("LISTEN_ADDR must be set".to_string());
		}
		Ok(())
	}

	#[must_use]
	pub fn queue_config(&self) -> QueueConfig {
		QueueConfig {
			worker_count: self.worker_count,
			scan_interval: self.scan_interval,
			scan_limit: 100,
			shutdown_grace: self.shutdown_grace,
		}
	}

	#[must_use]
	pub fn uploads_dir(&self) -> PathBuf {
		self.data_root.join("uploads")
	}

	#[must_use]
	pub fn batches_dir(&self) -> PathBuf {
		self.data_root.join("batches")
	}

	#[must_use]
	pub fn temp_dir(&self) -> PathBuf {
		self.data_root.join("tmp")
	}
}

fn parse_duration(s: &str) -> Result<Duration, std::num::ParseIntError> {
	s.parse::<u64>().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		let config = Config::try_parse_from(["scriberr"]).unwrap();
		config.validate().unwrap();
		assert_eq!(config.scan_interval, Duration::from_secs(10));
		assert_eq!(config.webhook_attempts, 3);
	}

	#[test]
	fn zero_workers_is_rejected() {
		let config = Config::try_parse_from(["scriberr", "--worker-count", "0"]).unwrap();
		assert!(config.validate().is_err());
	}
}
