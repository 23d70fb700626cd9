use std::path::{Path, PathBuf};

use adapters::subprocess::{run_capture_stdout, SubprocessSpec};
use adapters::{AudioInput, Capabilities};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::Preprocessor;

pub const TARGET_SAMPLE_RATE: u32 = 16_000;
pub const TARGET_CHANNELS: u16 = 1;
pub const TARGET_CODEC: &str = "pcm_s16le";

#[derive(Debug, Deserialize)]
struct FfprobeStream {
	#[serde(default)]
	codec_name: Option<String>,
	#[serde(default)]
	sample_rate: Option<String>,
	#[serde(default)]
	channels: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
	#[serde(default)]
	duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
	#[serde(default)]
	streams: Vec<FfprobeStream>,
	#[serde(default)]
	format: Option<FfprobeFormat>,
}

/// What ffprobe told us about an audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioProbe {
	pub codec: Option<String>,
	pub sample_rate: Option<u32>,
	pub channels: Option<u16>,
	pub duration_seconds: Option<f64>,
}

impl AudioProbe {
	pub fn from_ffprobe_json(raw: &str) -> Result<Self> {
		let parsed: FfprobeOutput = serde_json::from_str(raw).map_err(|e| PipelineError::Probe(format!("unparseable ffprobe output: {e}")))?;
		let stream = parsed.streams.into_iter().next().ok_or_else(|| PipelineError::Probe("no audio stream found".to_string()))?;

		Ok(Self {
			codec: stream.codec_name,
			sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
			channels: stream.channels,
			duration_seconds: parsed.format.and_then(|f| f.duration).and_then(|d| d.parse().ok()),
		})
	}
}

/// True when the input must be converted before an adapter sees it.
/// 16 kHz mono PCM WAV passes through untouched, with no temp file.
#[must_use]
pub fn needs_normalization(probe: &AudioProbe, path: &Path) -> bool {
	let is_wav = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("wav"));
	!(is_wav
		&& probe.codec.as_deref() == Some(TARGET_CODEC)
		&& probe.sample_rate == Some(TARGET_SAMPLE_RATE)
		&& probe.channels == Some(TARGET_CHANNELS))
}

/// Mandatory preprocessor producing 16 kHz mono PCM WAV via the media
/// toolchain. Output lands in a per-job temp directory and is marked
/// temporary for post-job cleanup.
pub struct AudioNormalizer {
	temp_root: PathBuf,
}

impl AudioNormalizer {
	#[must_use]
	pub fn new(temp_root: PathBuf) -> Self {
		Self { temp_root }
	}

	async fn probe(&self, path: &Path, cancel: &CancellationToken) -> Result<AudioProbe> {
		let spec = SubprocessSpec::new(
			"ffprobe",
			vec![
				"-v".to_string(),
				"error".to_string(),
				"-select_streams".to_string(),
				"a:0".to_string(),
				"-print_format".to_string(),
				"json".to_string(),
				"-show_streams".to_string(),
				"-show_format".to_string(),
				path.display().to_string(),
			],
		);
		let raw = run_capture_stdout(&spec, cancel).await?;
		AudioProbe::from_ffprobe_json(&raw)
	}

	async fn convert(&self, path: &Path, cancel: &CancellationToken) -> Result<PathBuf> {
		let out_dir = self.temp_root.join(Uuid::new_v4().to_string());
		tokio::fs::create_dir_all(&out_dir).await?;
		let out_path = out_dir.join("normalized.wav");

		let spec = SubprocessSpec::new(
			"ffmpeg",
			vec![
				"-y".to_string(),
				"-i".to_string(),
				path.display().to_string(),
				"-ar".to_string(),
				TARGET_SAMPLE_RATE.to_string(),
				"-ac".to_string(),
				TARGET_CHANNELS.to_string(),
				"-c:a".to_string(),
				TARGET_CODEC.to_string(),
				out_path.display().to_string(),
			],
		);
		run_capture_stdout(&spec, cancel)
			.await
			.map_err(|e| PipelineError::Normalize(format!("ffmpeg conversion of {} failed: {e}", path.display())))?;

		Ok(out_path)
	}
}

#[async_trait]
impl Preprocessor for AudioNormalizer {
	fn name(&self) -> &str {
		"audio-normalizer"
	}

	fn applies_to(&self, _capabilities: &Capabilities) -> bool {
		true
	}

	async fn process(&self, mut input: AudioInput, cancel: &CancellationToken) -> Result<AudioInput> {
		let probe = self.probe(&input.path, cancel).await?;

		if !needs_normalization(&probe, &input.path) {
			debug!(path = %input.path.display(), "input already conformant, passing through");
			input.sample_rate = probe.sample_rate;
			input.channels = probe.channels;
			input.duration_seconds = probe.duration_seconds;
			return Ok(input);
		}

		let out_path = self.convert(&input.path, cancel).await?;
		Ok(AudioInput {
			path: out_path,
			temporary: true,
			sample_rate: Some(TARGET_SAMPLE_RATE),
			channels: Some(TARGET_CHANNELS),
			duration_seconds: probe.duration_seconds,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const FFPROBE_JSON: &str = r#"{
		"streams": [{"codec_name": "pcm_s16le", "sample_rate": "16000", "channels": 1}],
		"format": {"duration": "30.250000"}
	}"#;

	#[test]
	fn parses_ffprobe_output() {
		let probe = AudioProbe::from_ffprobe_json(FFPROBE_JSON).unwrap();
		assert_eq!(probe.codec.as_deref(), Some("pcm_s16le"));
		assert_eq!(probe.sample_rate, Some(16_000));
		assert_eq!(probe.channels, Some(1));
		assert!((probe.duration_seconds.unwrap() - 30.25).abs() < 1e-9);
	}

	#[test]
	fn probe_without_streams_is_an_error() {
		assert!(AudioProbe::from_ffprobe_json(r#"{"streams": []}"#).is_err());
	}

	#[test]
	fn conformant_wav_passes_through() {
		let probe = AudioProbe::from_ffprobe_json(FFPROBE_JSON).unwrap();
		assert!(!needs_normalization(&probe, Path::new("/data/clip.wav")));
		assert!(!needs_normalization(&probe, Path::new("/data/CLIP.WAV")));
	}

	#[test]
	fn wrong_rate_channels_or_container_converts() {
		let mut probe = AudioProbe::from_ffprobe_json(FFPROBE_JSON).unwrap();
		assert!(needs_normalization(&probe, Path::new("/data/clip.mp3")));

		probe.sample_rate = Some(44_100);
		assert!(needs_normalization(&probe, Path::new("/data/clip.wav")));

		probe.sample_rate = Some(16_000);
		probe.channels = Some(2);
		assert!(needs_normalization(&probe, Path::new("/data/clip.wav")));
	}
}
