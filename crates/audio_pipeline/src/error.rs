use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
	#[error("audio probe failed: {0}")]
	Probe(String),

	#[error("normalization failed: {0}")]
	Normalize(String),

	#[error("project file parse failed: {0}")]
	ProjectParse(String),

	#[error("track merge failed: {0}")]
	Merge(String),

	#[error(transparent)]
	Subprocess(#[from] adapters::AdapterError),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
