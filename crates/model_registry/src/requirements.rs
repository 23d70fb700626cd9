use std::collections::BTreeMap;

use adapters::Feature;
use serde::{Deserialize, Serialize};

/// What a job needs from a model, distilled from its parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRequirements {
	/// Decoding language; `None` and `"auto"` both mean auto-detect.
	pub language: Option<String>,
	pub required_features: Vec<Feature>,
	pub max_memory_mb: Option<i64>,
	/// `Some(true)` requires a GPU adapter, `Some(false)` prefers CPU.
	pub gpu: Option<bool>,
	pub preferred_family: Option<String>,
	/// "fast" | "good" | "best" selection hint.
	pub quality: Option<String>,
	/// Explicit adapter preference; bypasses capability scoring when the
	/// id is registered.
	pub model: Option<String>,
	pub constraints: BTreeMap<String, String>,
	/// Hard wall-clock cap, carried through as a selection hint; the
	/// orchestrator enforces it.
	pub max_processing_time_s: Option<i64>,
}

impl ModelRequirements {
	#[must_use]
	pub fn needs_diarization(&self) -> bool {
		self.required_features.contains(&Feature::Diarization)
	}

	#[must_use]
	pub fn describe(&self) -> String {
		let mut parts = Vec::new();
		if let Some(language) = &self.language {
			parts.push(format!("language={language}"));
		}
		if !self.required_features.is_empty() {
			parts.push(format!("features={:?}", self.required_features));
		}
		if let Some(cap) = self.max_memory_mb {
			parts.push(format!("max_memory_mb={cap}"));
		}
		if let Some(gpu) = self.gpu {
			parts.push(format!("gpu={gpu}"));
		}
		if let Some(quality) = &self.quality {
			parts.push(format!("quality={quality}"));
		}
		if parts.is_empty() {
			"no constraints".to_string()
		} else {
			parts.join(", ")
		}
	}
}
