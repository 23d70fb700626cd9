use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use adapters::{AdapterContext, AdapterKind, AudioInput, Capabilities, Feature, ModelAdapter, ParameterSchema, TranscriptResult};
use async_trait::async_trait;
use model_registry::{ModelRegistry, ModelRequirements, RegistryError};

struct StubAdapter {
	id: String,
	kind: AdapterKind,
	capabilities: Capabilities,
	schema: ParameterSchema,
}

impl StubAdapter {
	fn new(id: &str, kind: AdapterKind, display_name: &str, features: BTreeSet<Feature>) -> Self {
		Self {
			id: id.to_string(),
			kind,
			capabilities: Capabilities {
				family: id.split('-').next().unwrap_or(id).to_string(),
				display_name: display_name.to_string(),
				languages: vec!["auto".to_string(), "en".to_string(), "de".to_string()],
				features,
				memory_mb: 2000,
				requires_gpu: false,
				metadata: BTreeMap::new(),
			},
			schema: ParameterSchema::default(),
		}
	}
}

#[async_trait]
impl ModelAdapter for StubAdapter {
	fn id(&self) -> &str {
		&self.id
	}

	fn version(&self) -> &str {
		"test"
	}

	fn kind(&self) -> AdapterKind {
		self.kind
	}

	fn capabilities(&self) -> &Capabilities {
		&self.capabilities
	}

	fn parameter_schema(&self) -> &ParameterSchema {
		&self.schema
	}

	async fn prepare(&self) -> adapters::Result<()> {
		Ok(())
	}

	fn is_ready(&self) -> bool {
		true
	}

	fn estimate_processing_time(&self, _audio_seconds: f64) -> Duration {
		Duration::from_secs(1)
	}

	async fn invoke(&self, _input: &AudioInput, _params: &serde_json::Value, _ctx: AdapterContext) -> adapters::Result<TranscriptResult> {
		unreachable!("selection tests never invoke")
	}
}

fn registry() -> ModelRegistry {
	let mut registry = ModelRegistry::new();
	registry.register(Arc::new(StubAdapter::new(
		"whisper-small",
		AdapterKind::Transcription,
		"Whisper Small",
		BTreeSet::from([Feature::Timestamps, Feature::Translation]),
	)));
	registry.register(Arc::new(StubAdapter::new(
		"whisper-medium",
		AdapterKind::Transcription,
		"Whisper Medium",
		BTreeSet::from([Feature::Timestamps, Feature::Translation]),
	)));
	registry.register(Arc::new(StubAdapter::new(
		"pyannote-diarization",
		AdapterKind::Diarization,
		"Pyannote Diarization",
		BTreeSet::from([Feature::Timestamps, Feature::Diarization]),
	)));
	registry.register(Arc::new(StubAdapter::new(
		"whisperx-large",
		AdapterKind::Composite,
		"WhisperX Large",
		BTreeSet::from([Feature::Timestamps, Feature::Diarization, Feature::HighQuality]),
	)));
	registry
}

#[test]
fn diarization_requirement_selects_a_diarizing_adapter() {
	let registry = registry();
	let requirements = ModelRequirements {
		language: Some("en".to_string()),
		required_features: vec![Feature::Diarization],
		..Default::default()
	};

	let adapter = registry.select(&requirements).unwrap();
	assert!(adapter.capabilities().has_feature(Feature::Diarization));
}

#[test]
fn transcription_pool_includes_composites() {
	let registry = registry();
	let requirements = ModelRequirements {
		language: Some("en".to_string()),
		quality: Some("best".to_string()),
		..Default::default()
	};

	// "Large" hits the best bucket, pushing the composite above the
	// transcription-only candidates.
	let adapter = registry.select(&requirements).unwrap();
	assert_eq!(adapter.id(), "whisperx-large");
}

#[test]
fn ties_resolve_by_registration_order() {
	let registry = registry();
	let requirements = ModelRequirements {
		language: Some("en".to_string()),
		..Default::default()
	};

	// whisper-small, whisper-medium, and whisperx-large all score 20.
	let adapter = registry.select(&requirements).unwrap();
	assert_eq!(adapter.id(), "whisper-small");
}

#[test]
fn explicit_model_bypasses_scoring() {
	let registry = registry();
	let requirements = ModelRequirements {
		model: Some("whisper-medium".to_string()),
		quality: Some("fast".to_string()),
		..Default::default()
	};

	let adapter = registry.select(&requirements).unwrap();
	assert_eq!(adapter.id(), "whisper-medium");
}

#[test]
fn unknown_model_is_no_suitable_model() {
	let registry = registry();
	let requirements = ModelRequirements {
		model: Some("does-not-exist".to_string()),
		..Default::default()
	};

	let err = registry.select(&requirements).unwrap_err();
	assert!(err.to_string().contains("no suitable model"));
	let RegistryError::NoSuitableModel(detail) = err;
	assert!(detail.contains("does-not-exist"));
}

#[test]
fn unsupported_language_everywhere_fails() {
	let mut strict = ModelRegistry::new();
	let mut adapter = StubAdapter::new("whisper-small", AdapterKind::Transcription, "Whisper Small", BTreeSet::from([Feature::Timestamps]));
	adapter.capabilities.languages = vec!["en".to_string()];
	strict.register(Arc::new(adapter));

	let requirements = ModelRequirements {
		language: Some("sw".to_string()),
		..Default::default()
	};
	assert!(strict.select(&requirements).is_err());
}

#[test]
fn zero_score_candidates_are_discarded() {
	let mut registry = ModelRegistry::new();
	registry.register(Arc::new(StubAdapter::new(
		"whisper-small",
		AdapterKind::Transcription,
		"Whisper Small",
		BTreeSet::from([Feature::Timestamps]),
	)));

	// No language criterion and one absent feature: 0 - 10 < 0.
	let requirements = ModelRequirements {
		required_features: vec![Feature::Vad],
		..Default::default()
	};
	assert!(registry.select(&requirements).is_err());
}
