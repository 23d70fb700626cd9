pub mod aup;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod stages;

pub use aup::{flatten_tracks, parse_project, serialize_project, FlattenedTrack, ProjectClip, ProjectTrack};
pub use error::{PipelineError, Result};
pub use merge::merge_tracks;
pub use normalize::AudioNormalizer;
pub use stages::{DenoiseStage, VadTrimStage};

use std::path::PathBuf;
use std::sync::Arc;

use adapters::{AudioInput, Capabilities};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One stage of the preprocessing chain. Stages are gated by a predicate
/// over the selected adapter's capabilities and must hand on an input that
/// still satisfies the normalization requirement.
#[async_trait]
pub trait Preprocessor: Send + Sync {
	fn name(&self) -> &str;

	fn applies_to(&self, capabilities: &Capabilities) -> bool;

	async fn process(&self, input: AudioInput, cancel: &CancellationToken) -> Result<AudioInput>;
}

#[derive(Debug)]
pub struct PipelineOutput {
	pub input: AudioInput,
	/// Stage-produced files the orchestrator deletes after the job reaches
	/// a terminal state.
	pub temp_paths: Vec<PathBuf>,
}

/// Ordered preprocessor chain. A failing stage is logged and skipped; the
/// previous input flows on, so preprocessing never fails a job by itself.
pub struct PreprocessingPipeline {
	stages: Vec<Arc<dyn Preprocessor>>,
}

impl PreprocessingPipeline {
	#[must_use]
	pub fn new(stages: Vec<Arc<dyn Preprocessor>>) -> Self {
		Self { stages }
	}

	/// The default chain: mandatory audio normalization, then the optional
	/// capability-gated stages.
	#[must_use]
	pub fn standard(temp_root: PathBuf) -> Self {
		Self::new(vec![
			Arc::new(AudioNormalizer::new(temp_root)),
			Arc::new(VadTrimStage),
			Arc::new(DenoiseStage),
		])
	}

	pub async fn run(&self, input: AudioInput, capabilities: &Capabilities, cancel: &CancellationToken) -> PipelineOutput {
		let mut current = input;
		let mut temp_paths = Vec::new();

		for stage in &self.stages {
			if !stage.applies_to(capabilities) {
				continue;
			}
			match stage.process(current.clone(), cancel).await {
				Ok(next) => {
					if next.temporary && next.path != current.path && !temp_paths.contains(&next.path) {
						temp_paths.push(next.path.clone());
					}
					current = next;
				}
				Err(e) => {
					warn!(stage = stage.name(), error = %e, "preprocessor failed, passing input through");
				}
			}
		}

		PipelineOutput { input: current, temp_paths }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::{BTreeMap, BTreeSet};

	fn caps() -> Capabilities {
		Capabilities {
			family: "whisper".to_string(),
			display_name: "Whisper Small".to_string(),
			languages: vec!["auto".to_string()],
			features: BTreeSet::new(),
			memory_mb: 2000,
			requires_gpu: false,
			metadata: BTreeMap::new(),
		}
	}

	struct Renaming;

	#[async_trait]
	impl Preprocessor for Renaming {
		fn name(&self) -> &str {
			"renaming"
		}

		fn applies_to(&self, _capabilities: &Capabilities) -> bool {
			true
		}

		async fn process(&self, mut input: AudioInput, _cancel: &CancellationToken) -> Result<AudioInput> {
			input.path = input.path.with_extension("normalized.wav");
			input.temporary = true;
			Ok(input)
		}
	}

	struct Exploding;

	#[async_trait]
	impl Preprocessor for Exploding {
		fn name(&self) -> &str {
			"exploding"
		}

		fn applies_to(&self, _capabilities: &Capabilities) -> bool {
			true
		}

		async fn process(&self, _input: AudioInput, _cancel: &CancellationToken) -> Result<AudioInput> {
			Err(PipelineError::Normalize("synthetic failure".to_string()))
		}
	}

	struct Gated;

	#[async_trait]
	impl Preprocessor for Gated {
		fn name(&self) -> &str {
			"gated"
		}

		fn applies_to(&self, capabilities: &Capabilities) -> bool {
			capabilities.has_feature(adapters::Feature::Vad)
		}

		async fn process(&self, _input: AudioInput, _cancel: &CancellationToken) -> Result<AudioInput> {
			panic!("must not run for capabilities without VAD");
		}
	}

	#[tokio::test]
	async fn failing_stage_passes_original_input_through() {
		let pipeline = PreprocessingPipeline::new(vec![Arc::new(Exploding), Arc::new(Renaming)]);
		let input = AudioInput::from_path("/tmp/a.wav");

		let output = pipeline.run(input, &caps(), &CancellationToken::new()).await;
		assert_eq!(output.input.path, PathBuf::from("/tmp/a.normalized.wav"));
		assert_eq!(output.temp_paths, vec![PathBuf::from("/tmp/a.normalized.wav")]);
	}

	#[tokio::test]
	async fn stages_are_gated_by_capabilities() {
		let pipeline = PreprocessingPipeline::new(vec![Arc::new(Gated)]);
		let input = AudioInput::from_path("/tmp/a.wav");

		let output = pipeline.run(input, &caps(), &CancellationToken::new()).await;
		assert_eq!(output.input.path, PathBuf::from("/tmp/a.wav"));
		assert!(output.temp_paths.is_empty());
	}
}
