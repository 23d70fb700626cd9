pub mod core;
pub mod error;

pub use crate::core::model::{
	BatchCounter, BatchStatus, CreateJob, CsvBatch, CsvBatchRow, ExecutionOutcome, JobExecution, JobParameters, JobStatus, MergeStatus, MultiTrackFile, NewMultiTrackFile,
	RowStatus, SpeakerMapping, TranscriptionJob, TranscriptionProfile, UpdateJob,
};
pub use crate::error::{Result, StoreError};

use sqlx::SqlitePool;

/// Sole owner of persisted mutable state. Every write in the system goes
/// through one of the typed operations on this handle.
#[derive(Clone)]
pub struct JobStore {
	pool: SqlitePool,
}

impl JobStore {
	#[must_use]
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[must_use]
	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Create tables, collapse legacy speaker-mapping duplicates, and only
	/// then install the uniqueness index that would reject them.
	pub async fn migrate(&self) -> Result<()> {
		crate::core::schema::init_schema(&self.pool).await?;
		self.collapse_duplicate_speakers().await?;
		crate::core::schema::init_unique_indexes(&self.pool).await?;
		Ok(())
	}
}
