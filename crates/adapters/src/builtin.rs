use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::capabilities::{Capabilities, Feature};
use crate::environment::{AdapterEnvironment, EnvironmentSpec};
use crate::error::{AdapterError, Result};
use crate::input::AudioInput;
use crate::result::{normalize_sidecar, TranscriptResult};
use crate::schema::{args_from_parameters, ParameterField, ParameterSchema};
use crate::subprocess::{parse_progress_line, run_to_sidecar, SubprocessSpec};
use crate::{AdapterContext, AdapterKind, ModelAdapter};

/// The parameter surface shared by every built-in engine: exactly the
/// request knobs the HTTP layer accepts.
#[must_use]
pub fn base_schema() -> Vec<ParameterField> {
	vec![
		ParameterField::text("language").max_length(16),
		ParameterField::text("model").max_length(64).pattern("^[A-Za-z0-9._-]+$"),
		ParameterField::choice("device", &["cpu", "gpu"]),
		ParameterField::boolean("diarize"),
		ParameterField::boolean("translate"),
		ParameterField::choice("quality", &["fast", "good", "best"]),
		ParameterField::integer("max_memory_mb", Some(0), None),
		ParameterField::integer("max_processing_time_s", Some(1), None),
	]
}

#[must_use]
pub fn diarization_fields() -> Vec<ParameterField> {
	vec![
		ParameterField::integer("min_speakers", Some(1), Some(32)).requires("max_speakers"),
		ParameterField::integer("max_speakers", Some(1), Some(32)).requires("min_speakers"),
	]
}

/// Uniform subprocess-backed adapter: one Python module per engine, invoked
/// as `python -m <module> --input … --output …` plus schema-ordered knob
/// flags, writing its result to the input's JSON sidecar.
pub struct PythonModelAdapter {
	id: String,
	version: String,
	kind: AdapterKind,
	module: String,
	capabilities: Capabilities,
	schema: ParameterSchema,
	env: AdapterEnvironment,
	realtime_factor: f64,
}

impl PythonModelAdapter {
	#[must_use]
	pub fn environment(&self) -> &AdapterEnvironment {
		&self.env
	}

	fn command_args(&self, input: &AudioInput, params: &serde_json::Value) -> Vec<String> {
		let mut args = vec![
			"-m".to_string(),
			self.module.clone(),
			"--input".to_string(),
			input.path.display().to_string(),
			"--output".to_string(),
			input.sidecar_path().display().to_string(),
		];
		args.extend(args_from_parameters(&self.schema, params));
		args
	}
}

#[async_trait]
impl ModelAdapter for PythonModelAdapter {
	fn id(&self) -> &str {
		&self.id
	}

	fn version(&self) -> &str {
		&self.version
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

	async fn prepare(&self) -> Result<()> {
		self.env.prepare().await
	}

	fn is_ready(&self) -> bool {
		self.env.is_ready()
	}

	fn estimate_processing_time(&self, audio_seconds: f64) -> Duration {
		Duration::from_secs_f64((audio_seconds * self.realtime_factor).max(1.0))
	}

	async fn invoke(&self, input: &AudioInput, params: &serde_json::Value, ctx: AdapterContext) -> Result<TranscriptResult> {
		if !self.is_ready() {
			return Err(AdapterError::NotReady(self.id.clone()));
		}

		let sidecar = input.sidecar_path();
		let spec = SubprocessSpec::new(self.env.python().display().to_string(), self.command_args(input, params));

		let progress_ctx = ctx.clone();
		let on_stderr = move |line: &str| {
			if let Some(update) = parse_progress_line(line) {
				progress_ctx.emit_progress(update.fraction, &update.stage);
			}
		};

		let started = Instant::now();
		let raw = run_to_sidecar(&spec, &sidecar, &ctx.cancel, Some(&on_stderr)).await?;
		normalize_sidecar(&raw, &self.id, started.elapsed().as_secs_f64())
	}
}

const WHISPER_LANGUAGES: &[&str] = &["auto", "en", "es", "de", "fr", "it", "pt", "nl", "ja", "zh", "ko", "ru", "uk", "pl", "tr", "ar", "hi"];

fn language_list() -> Vec<String> {
	WHISPER_LANGUAGES.iter().map(ToString::to_string).collect()
}

/// CPU-friendly Whisper transcription adapter, one per model size.
#[must_use]
pub fn whisper(data_root: &Path, size: &str, memory_mb: i64, realtime_factor: f64) -> PythonModelAdapter {
	let mut display_size = size.to_string();
	if let Some(first) = display_size.get_mut(0..1) {
		first.make_ascii_uppercase();
	}

	PythonModelAdapter {
		id: format!("whisper-{size}"),
		version: "20240930".to_string(),
		kind: AdapterKind::Transcription,
		module: "whisper_timestamped".to_string(),
		capabilities: Capabilities {
			family: "whisper".to_string(),
			display_name: format!("Whisper {display_size}"),
			languages: language_list(),
			features: BTreeSet::from([Feature::Timestamps, Feature::Translation]),
			memory_mb,
			requires_gpu: false,
			metadata: BTreeMap::from([("engine".to_string(), "whisper-timestamped".to_string())]),
		},
		schema: ParameterSchema::new(base_schema()),
		env: AdapterEnvironment::new(EnvironmentSpec {
			name: format!("whisper-{size}"),
			root: data_root.join("models").join("whisper"),
			python_packages: vec!["whisper-timestamped".to_string()],
			required_binaries: vec!["ffmpeg".to_string(), "uv".to_string()],
		}),
		realtime_factor,
	}
}

/// Speaker-turn diarization via pyannote. Emits turns only; composition
/// with a transcription adapter happens at selection time.
#[must_use]
pub fn pyannote(data_root: &Path) -> PythonModelAdapter {
	let mut fields = base_schema();
	fields.extend(diarization_fields());

	PythonModelAdapter {
		id: "pyannote-diarization".to_string(),
		version: "3.1".to_string(),
		kind: AdapterKind::Diarization,
		module: "scriberr_diarize".to_string(),
		capabilities: Capabilities {
			family: "pyannote".to_string(),
			display_name: "Pyannote Diarization".to_string(),
			languages: vec!["*".to_string()],
			features: BTreeSet::from([Feature::Timestamps, Feature::Diarization]),
			memory_mb: 3000,
			requires_gpu: false,
			metadata: BTreeMap::from([("engine".to_string(), "pyannote.audio".to_string())]),
		},
		schema: ParameterSchema::new(fields),
		env: AdapterEnvironment::new(EnvironmentSpec {
			name: "pyannote".to_string(),
			root: data_root.join("models").join("pyannote"),
			python_packages: vec!["pyannote.audio".to_string()],
			required_binaries: vec!["ffmpeg".to_string(), "uv".to_string()],
		}),
		realtime_factor: 0.6,
	}
}

/// Composite transcription + word alignment + diarization.
#[must_use]
pub fn whisperx(data_root: &Path) -> PythonModelAdapter {
	let mut fields = base_schema();
	fields.extend(diarization_fields());

	PythonModelAdapter {
		id: "whisperx-large".to_string(),
		version: "3.3".to_string(),
		kind: AdapterKind::Composite,
		module: "whisperx".to_string(),
		capabilities: Capabilities {
			family: "whisperx".to_string(),
			display_name: "WhisperX Large-v3 Turbo".to_string(),
			languages: language_list(),
			features: BTreeSet::from([Feature::Timestamps, Feature::Diarization, Feature::Translation, Feature::Vad, Feature::HighQuality]),
			memory_mb: 8000,
			requires_gpu: true,
			metadata: BTreeMap::from([("engine".to_string(), "whisperx".to_string())]),
		},
		schema: ParameterSchema::new(fields),
		env: AdapterEnvironment::new(EnvironmentSpec {
			name: "whisperx".to_string(),
			root: data_root.join("models").join("whisperx"),
			python_packages: vec!["whisperx".to_string()],
			required_binaries: vec!["ffmpeg".to_string(), "uv".to_string()],
		}),
		realtime_factor: 0.4,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn whisper_command_is_deterministic() {
		let adapter = whisper(Path::new("/data"), "small", 2000, 0.9);
		let input = AudioInput::from_path("/data/uploads/a/clip.wav");
		let params = json!({"language": "en", "quality": "fast"});

		let args = adapter.command_args(&input, &params);
		assert_eq!(
			args,
			vec!["-m", "whisper_timestamped", "--input", "/data/uploads/a/clip.wav", "--output", "/data/uploads/a/clip.json", "--language", "en", "--quality", "fast",]
		);
		assert_eq!(args, adapter.command_args(&input, &params));
	}

	#[test]
	fn whisper_rejects_speaker_knobs() {
		let adapter = whisper(Path::new("/data"), "small", 2000, 0.9);
		let err = adapter.validate_parameters(&json!({"min_speakers": 2, "max_speakers": 2})).unwrap_err();
		assert!(err.to_string().contains("unknown parameter"));
	}

	#[test]
	fn composite_accepts_speaker_pair() {
		let adapter = whisperx(Path::new("/data"));
		adapter
			.validate_parameters(&json!({"diarize": true, "min_speakers": 2, "max_speakers": 2}))
			.unwrap();
	}

	#[test]
	fn invoke_requires_preparation() {
		let adapter = whisper(Path::new("/data"), "small", 2000, 0.9);
		assert!(!adapter.is_ready());
	}

	#[test]
	fn estimates_scale_with_audio_duration() {
		let adapter = whisper(Path::new("/data"), "small", 2000, 0.5);
		assert_eq!(adapter.estimate_processing_time(60.0), Duration::from_secs(30));
		assert_eq!(adapter.estimate_processing_time(0.5), Duration::from_secs(1));
	}
}
