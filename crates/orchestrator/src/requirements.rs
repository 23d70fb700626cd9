use adapters::Feature;
use job_store::JobParameters;
use model_registry::ModelRequirements;

/// Distill a job's request knobs into what the registry scores against.
/// `fallback_language` is the job row's language column, used when the
/// parameters don't carry one.
#[must_use]
pub fn requirements_from_parameters(params: &JobParameters, fallback_language: Option<&str>) -> ModelRequirements {
	let mut required_features = Vec::new();
	if params.diarize == Some(true) {
		required_features.push(Feature::Diarization);
	}
	if params.translate == Some(true) {
		required_features.push(Feature::Translation);
	}

	let gpu = params.device.as_deref().and_then(|device| match device {
		"gpu" => Some(true),
		"cpu" => Some(false),
		_ => None,
	});

	ModelRequirements {
		language: params.language.clone().or_else(|| fallback_language.map(ToString::to_string)),
		required_features,
		max_memory_mb: params.max_memory_mb,
		gpu,
		preferred_family: None,
		quality: params.quality.clone(),
		model: params.model.clone(),
		constraints: std::collections::BTreeMap::new(),
		max_processing_time_s: params.max_processing_time_s,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn diarize_and_translate_become_required_features() {
		let params = JobParameters {
			diarize: Some(true),
			translate: Some(true),
			..JobParameters::default()
		};
		let requirements = requirements_from_parameters(&params, None);
		assert!(requirements.required_features.contains(&Feature::Diarization));
		assert!(requirements.required_features.contains(&Feature::Translation));
		assert!(requirements.needs_diarization());
	}

	#[test]
	fn device_maps_to_gpu_preference() {
		let gpu = JobParameters {
			device: Some("gpu".to_string()),
			..JobParameters::default()
		};
		assert_eq!(requirements_from_parameters(&gpu, None).gpu, Some(true));

		let cpu = JobParameters {
			device: Some("cpu".to_string()),
			..JobParameters::default()
		};
		assert_eq!(requirements_from_parameters(&cpu, None).gpu, Some(false));
	}

	#[test]
	fn parameter_language_wins_over_fallback() {
		let params = JobParameters {
			language: Some("de".to_string()),
			..JobParameters::default()
		};
		let requirements = requirements_from_parameters(&params, Some("en"));
		assert_eq!(requirements.language.as_deref(), Some("de"));

		let empty = JobParameters::default();
		assert_eq!(requirements_from_parameters(&empty, Some("en")).language.as_deref(), Some("en"));
	}
}
