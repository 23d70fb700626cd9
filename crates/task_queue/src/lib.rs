pub mod config;
pub mod error;
pub mod pool;

pub use config::QueueConfig;
pub use error::{QueueError, Result};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// What a worker does with a claimed job. Implemented by the orchestrator;
/// the queue knows nothing about transcription.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
	async fn run_job(&self, job_id: &str, cancel: CancellationToken);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
	/// The job was in flight; its worker's token has been cancelled.
	Signalled,
	/// The job was queued but unclaimed; it was removed and failed.
	Dequeued,
	/// Neither queued nor in flight.
	NotFound,
}

pub use pool::TaskQueue;
