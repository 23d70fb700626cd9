use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
	#[error("record not found")]
	NotFound,

	#[error("stale status transition: expected {expected}, found {actual}")]
	Stale { expected: String, actual: String },

	#[error("database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Json(#[from] serde_json::Error),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
