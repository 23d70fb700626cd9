use job_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
	#[error("job {job_id} cannot be submitted from status `{actual}`")]
	InvalidState { job_id: String, actual: String },

	#[error("job not found")]
	NotFound,

	#[error("store error: {0}")]
	Store(#[from] StoreError),
}

pub type Result<T, E = QueueError> = std::result::Result<T, E>;
