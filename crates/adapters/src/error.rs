use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
	#[error("invalid parameters: {0}")]
	InvalidParameters(String),

	#[error("adapter not ready: {0}")]
	NotReady(String),

	#[error("environment preparation failed: {0}")]
	Preparation(String),

	#[error("execution failed: {message}")]
	Execution { message: String, stderr_tail: String },

	#[error("execution was cancelled")]
	Cancelled,

	#[error("result parsing failed: {0}")]
	ResultParse(String),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

pub type Result<T, E = AdapterError> = std::result::Result<T, E>;
