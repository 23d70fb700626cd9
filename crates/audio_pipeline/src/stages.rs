use adapters::{AudioInput, Capabilities, Feature};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::Preprocessor;

/// Trims leading/trailing silence for adapters that benefit from VAD.
/// Currently a pass-through; the contract it must keep is that its output
/// still satisfies the normalization requirement.
pub struct VadTrimStage;

#[async_trait]
impl Preprocessor for VadTrimStage {
	fn name(&self) -> &str {
		"vad-trim"
	}

	fn applies_to(&self, capabilities: &Capabilities) -> bool {
		capabilities.has_feature(Feature::Vad)
	}

	async fn process(&self, input: AudioInput, _cancel: &CancellationToken) -> Result<AudioInput> {
		debug!(path = %input.path.display(), "vad trim pass-through");
		Ok(input)
	}
}

/// Spectral noise reduction ahead of high-quality models. Pass-through
/// until an engine is wired in.
pub struct DenoiseStage;

#[async_trait]
impl Preprocessor for DenoiseStage {
	fn name(&self) -> &str {
		"denoise"
	}

	fn applies_to(&self, capabilities: &Capabilities) -> bool {
		capabilities.metadata.get("denoise").is_some_and(|v| v == "enabled")
	}

	async fn process(&self, input: AudioInput, _cancel: &CancellationToken) -> Result<AudioInput> {
		debug!(path = %input.path.display(), "denoise pass-through");
		Ok(input)
	}
}
