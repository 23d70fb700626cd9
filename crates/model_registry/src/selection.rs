use adapters::Capabilities;

use crate::requirements::ModelRequirements;

const QUALITY_FAST: &[&str] = &["tiny", "small", "fast"];
const QUALITY_BEST: &[&str] = &["large", "xl", "turbo"];
const QUALITY_GOOD: &[&str] = &["medium", "base"];

/// Score one candidate against a requirement set. `None` means the
/// candidate is rejected outright (unsupported language).
#[must_use]
pub fn score_candidate(requirements: &ModelRequirements, capabilities: &Capabilities) -> Option<i64> {
	let mut score = 0_i64;

	if let Some(language) = &requirements.language {
		if !capabilities.supports_language(language) {
			return None;
		}
		score += 20;
	}

	for feature in &requirements.required_features {
		if capabilities.has_feature(*feature) {
			score += 15;
		} else {
			score -= 10;
		}
	}

	if let Some(cap) = requirements.max_memory_mb {
		if cap >= 0 {
			if capabilities.memory_mb > cap {
				score -= 20;
			} else {
				score += 5;
			}
		}
	}

	match requirements.gpu {
		Some(true) => {
			if capabilities.requires_gpu {
				score += 10;
			} else {
				score -= 15;
			}
		}
		Some(false) => {
			if capabilities.requires_gpu {
				score -= 10;
			} else {
				score += 10;
			}
		}
		None => {}
	}

	if let Some(family) = &requirements.preferred_family {
		if capabilities.family == *family {
			score += 15;
		}
	}

	if let Some(quality) = &requirements.quality {
		let keywords = match quality.as_str() {
			"fast" => QUALITY_FAST,
			"best" => QUALITY_BEST,
			"good" => QUALITY_GOOD,
			_ => &[],
		};
		let haystack = capabilities.display_name.to_lowercase();
		if keywords.iter().any(|k| haystack.contains(k)) {
			score += 10;
		}
	}

	for (key, value) in &requirements.constraints {
		if capabilities.metadata.get(key) == Some(value) {
			score += 5;
		}
	}

	Some(score)
}

#[cfg(test)]
mod tests {
	use super::*;
	use adapters::Feature;
	use std::collections::{BTreeMap, BTreeSet};

	fn caps() -> Capabilities {
		Capabilities {
			family: "whisper".to_string(),
			display_name: "Whisper Small".to_string(),
			languages: vec!["auto".to_string(), "en".to_string()],
			features: BTreeSet::from([Feature::Timestamps]),
			memory_mb: 2000,
			requires_gpu: false,
			metadata: BTreeMap::from([("engine".to_string(), "whisper".to_string())]),
		}
	}

	#[test]
	fn unsupported_language_rejects() {
		let mut c = caps();
		c.languages = vec!["en".to_string()];
		let requirements = ModelRequirements {
			language: Some("sw".to_string()),
			..Default::default()
		};
		assert_eq!(score_candidate(&requirements, &c), None);
	}

	#[test]
	fn supported_language_scores_twenty() {
		let requirements = ModelRequirements {
			language: Some("en".to_string()),
			..Default::default()
		};
		assert_eq!(score_candidate(&requirements, &caps()), Some(20));
	}

	#[test]
	fn auto_matches_wildcard_languages() {
		let requirements = ModelRequirements {
			language: Some("auto".to_string()),
			..Default::default()
		};
		assert_eq!(score_candidate(&requirements, &caps()), Some(20));
	}

	#[test]
	fn features_add_and_subtract() {
		let requirements = ModelRequirements {
			required_features: vec![Feature::Timestamps, Feature::Diarization],
			..Default::default()
		};
		// +15 present, -10 absent
		assert_eq!(score_candidate(&requirements, &caps()), Some(5));
	}

	#[test]
	fn memory_cap_scores_both_ways() {
		let within = ModelRequirements {
			max_memory_mb: Some(4000),
			..Default::default()
		};
		assert_eq!(score_candidate(&within, &caps()), Some(5));

		let exceeded = ModelRequirements {
			max_memory_mb: Some(1000),
			..Default::default()
		};
		assert_eq!(score_candidate(&exceeded, &caps()), Some(-20));
	}

	#[test]
	fn gpu_preferences() {
		let mut gpu_caps = caps();
		gpu_caps.requires_gpu = true;

		let wants_gpu = ModelRequirements {
			gpu: Some(true),
			..Default::default()
		};
		assert_eq!(score_candidate(&wants_gpu, &gpu_caps), Some(10));
		assert_eq!(score_candidate(&wants_gpu, &caps()), Some(-15));

		let wants_cpu = ModelRequirements {
			gpu: Some(false),
			..Default::default()
		};
		assert_eq!(score_candidate(&wants_cpu, &gpu_caps), Some(-10));
		assert_eq!(score_candidate(&wants_cpu, &caps()), Some(10));
	}

	#[test]
	fn family_quality_and_constraints() {
		let requirements = ModelRequirements {
			preferred_family: Some("whisper".to_string()),
			quality: Some("fast".to_string()),
			constraints: BTreeMap::from([("engine".to_string(), "whisper".to_string())]),
			..Default::default()
		};
		// family +15, "small" hits the fast bucket +10, constraint +5
		assert_eq!(score_candidate(&requirements, &caps()), Some(30));
	}
}
