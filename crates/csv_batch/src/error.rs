use job_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
	#[error("batch not found")]
	NotFound,

	#[error("batch is already running")]
	AlreadyRunning,

	#[error("batch is already completed")]
	AlreadyCompleted,

	#[error("csv contained no valid youtube urls")]
	NoValidRows,

	#[error("download failed: {0}")]
	Download(String),

	#[error("store error: {0}")]
	Store(#[from] StoreError),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Subprocess(#[from] adapters::AdapterError),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T, E = BatchError> = std::result::Result<T, E>;
