use std::path::{Path, PathBuf};

/// An audio artifact flowing through the preprocessing pipeline into an
/// adapter. `temporary` marks pipeline-produced files the orchestrator
/// deletes once the job reaches a terminal state.
#[derive(Debug, Clone)]
pub struct AudioInput {
	pub path: PathBuf,
	pub temporary: bool,
	pub sample_rate: Option<u32>,
	pub channels: Option<u16>,
	pub duration_seconds: Option<f64>,
}

impl AudioInput {
	#[must_use]
	pub fn from_path(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			temporary: false,
			sample_rate: None,
			channels: None,
			duration_seconds: None,
		}
	}

	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// The JSON sidecar an adapter writes its result to, derived from the
	/// input path.
	#[must_use]
	pub fn sidecar_path(&self) -> PathBuf {
		self.path.with_extension("json")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sidecar_path_is_predictable() {
		let input = AudioInput::from_path("/data/uploads/abc/clip.wav");
		assert_eq!(input.sidecar_path(), PathBuf::from("/data/uploads/abc/clip.json"));
	}
}
