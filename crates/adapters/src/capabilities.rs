use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
	Timestamps,
	Diarization,
	Translation,
	Vad,
	HighQuality,
}

/// The static, declared feature set of an adapter, read by the registry
/// during selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
	pub family: String,
	pub display_name: String,
	/// Supported language codes; `"auto"` and `"*"` are wildcards.
	pub languages: Vec<String>,
	pub features: BTreeSet<Feature>,
	pub memory_mb: i64,
	pub requires_gpu: bool,
	pub metadata: BTreeMap<String, String>,
}

impl Capabilities {
	#[must_use]
	pub fn supports_language(&self, language: &str) -> bool {
		self.languages.iter().any(|l| l == language || l == "auto" || l == "*")
	}

	#[must_use]
	pub fn has_feature(&self, feature: Feature) -> bool {
		self.features.contains(&feature)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn caps(languages: &[&str]) -> Capabilities {
		Capabilities {
			family: "whisper".to_string(),
			display_name: "Whisper Small".to_string(),
			languages: languages.iter().map(ToString::to_string).collect(),
			features: BTreeSet::from([Feature::Timestamps]),
			memory_mb: 2000,
			requires_gpu: false,
			metadata: BTreeMap::new(),
		}
	}

	#[test]
	fn wildcard_languages_match_anything() {
		assert!(caps(&["auto"]).supports_language("sw"));
		assert!(caps(&["*"]).supports_language("en"));
		assert!(caps(&["en", "de"]).supports_language("de"));
		assert!(!caps(&["en", "de"]).supports_language("sw"));
	}
}
