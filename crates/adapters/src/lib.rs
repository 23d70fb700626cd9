pub mod builtin;
pub mod capabilities;
pub mod environment;
pub mod error;
pub mod input;
pub mod result;
pub mod schema;
pub mod subprocess;

pub use capabilities::{Capabilities, Feature};
pub use environment::{AdapterEnvironment, EnvironmentSpec};
pub use error::{AdapterError, Result};
pub use input::AudioInput;
pub use result::{Segment, TranscriptResult, Word};
pub use schema::{ParameterField, ParameterKind, ParameterSchema};

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
	Transcription,
	Diarization,
	Composite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
	pub fraction: f64,
	pub stage: String,
}

/// Per-invocation context. The cancellation token is owned by the queue;
/// adapters observe it and never cancel it themselves.
#[derive(Clone)]
pub struct AdapterContext {
	pub cancel: CancellationToken,
	pub progress: Option<mpsc::UnboundedSender<ProgressUpdate>>,
}

impl AdapterContext {
	#[must_use]
	pub fn detached() -> Self {
		Self {
			cancel: CancellationToken::new(),
			progress: None,
		}
	}

	#[must_use]
	pub fn with_cancel(cancel: CancellationToken) -> Self {
		Self { cancel, progress: None }
	}

	pub fn emit_progress(&self, fraction: f64, stage: &str) {
		if let Some(tx) = &self.progress {
			let _ = tx.send(ProgressUpdate {
				fraction,
				stage: stage.to_string(),
			});
		}
	}
}

/// A bound, versioned wrapper around an external speech model. Implementors
/// run as subprocesses through [`subprocess`]; the trait is the seam where a
/// streaming family could attach later.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
	fn id(&self) -> &str;

	fn version(&self) -> &str;

	fn kind(&self) -> AdapterKind;

	fn capabilities(&self) -> &Capabilities;

	fn parameter_schema(&self) -> &ParameterSchema;

	/// Reject unknown or malformed parameters before any process launches.
	fn validate_parameters(&self, params: &serde_json::Value) -> Result<()> {
		self.parameter_schema().validate(params)
	}

	/// Idempotent per process lifetime. Failure leaves the adapter
	/// not-ready; selection retries preparation on next use.
	async fn prepare(&self) -> Result<()>;

	fn is_ready(&self) -> bool;

	fn estimate_processing_time(&self, audio_seconds: f64) -> Duration;

	async fn invoke(&self, input: &AudioInput, params: &serde_json::Value, ctx: AdapterContext) -> Result<TranscriptResult>;
}

impl std::fmt::Debug for dyn ModelAdapter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModelAdapter").field("id", &self.id()).field("version", &self.version()).finish()
	}
}
