use std::path::Path;

use adapters::subprocess::{run_capture_stdout, SubprocessSpec};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aup::FlattenedTrack;
use crate::error::{PipelineError, Result};
use crate::normalize::{TARGET_CHANNELS, TARGET_CODEC, TARGET_SAMPLE_RATE};

/// Build the media-toolchain invocation that mixes the non-muted tracks
/// into one normalized asset: per-input volume and delay filters feeding a
/// single mix. The output is mono, so per-track pan stays metadata and
/// never enters the filter graph.
pub fn build_merge_command(tracks: &[FlattenedTrack], folder: &Path, output: &Path) -> Result<SubprocessSpec> {
	let audible: Vec<&FlattenedTrack> = tracks.iter().filter(|t| !t.mute).collect();
	if audible.is_empty() {
		return Err(PipelineError::Merge("every track is muted".to_string()));
	}

	let mut args = vec!["-y".to_string()];
	for track in &audible {
		args.push("-i".to_string());
		args.push(folder.join(&track.filename).display().to_string());
	}

	let mut filter = String::new();
	for (i, track) in audible.iter().enumerate() {
		let delay_ms = (track.offset_seconds * 1000.0).round().max(0.0) as i64;
		filter.push_str(&format!("[{i}:a]volume={},adelay={delay_ms}|{delay_ms}[a{i}];", track.gain));
	}
	for i in 0..audible.len() {
		filter.push_str(&format!("[a{i}]"));
	}
	filter.push_str(&format!("amix=inputs={}:duration=longest:normalize=0[out]", audible.len()));

	args.extend([
		"-filter_complex".to_string(),
		filter,
		"-map".to_string(),
		"[out]".to_string(),
		"-ar".to_string(),
		TARGET_SAMPLE_RATE.to_string(),
		"-ac".to_string(),
		TARGET_CHANNELS.to_string(),
		"-c:a".to_string(),
		TARGET_CODEC.to_string(),
		output.display().to_string(),
	]);

	Ok(SubprocessSpec::new("ffmpeg", args))
}

/// Merge a multi-track project into a single audio asset at `output`.
pub async fn merge_tracks(tracks: &[FlattenedTrack], folder: &Path, output: &Path, cancel: &CancellationToken) -> Result<()> {
	let spec = build_merge_command(tracks, folder, output)?;
	run_capture_stdout(&spec, cancel)
		.await
		.map_err(|e| PipelineError::Merge(format!("mixing {} tracks failed: {e}", tracks.len())))?;
	info!(tracks = tracks.len(), output = %output.display(), "merged multi-track project");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn track(index: i64, filename: &str, offset: f64, gain: f64, mute: bool) -> FlattenedTrack {
		FlattenedTrack {
			track_index: index,
			filename: filename.to_string(),
			offset_seconds: offset,
			channel: 0,
			gain,
			pan: 0.0,
			mute,
		}
	}

	#[test]
	fn muted_tracks_are_excluded_from_the_mix() {
		let tracks = vec![track(0, "a.wav", 0.0, 1.0, false), track(1, "b.wav", 1.5, 0.5, true), track(2, "c.wav", 0.25, 1.0, false)];
		let spec = build_merge_command(&tracks, Path::new("/data/tracks"), Path::new("/data/merged.wav")).unwrap();

		let joined = spec.args.join(" ");
		assert!(joined.contains("/data/tracks/a.wav"));
		assert!(!joined.contains("b.wav"));
		assert!(joined.contains("amix=inputs=2"));
		assert!(joined.contains("adelay=250|250"));
		assert!(joined.contains("volume=1"));
	}

	#[test]
	fn all_muted_is_an_error() {
		let tracks = vec![track(0, "a.wav", 0.0, 1.0, true)];
		assert!(build_merge_command(&tracks, Path::new("/t"), Path::new("/o.wav")).is_err());
	}

	#[test]
	fn output_is_normalized_wav() {
		let tracks = vec![track(0, "a.wav", 0.0, 1.0, false)];
		let spec = build_merge_command(&tracks, Path::new("/t"), Path::new("/o.wav")).unwrap();
		let joined = spec.args.join(" ");
		assert!(joined.contains("-ar 16000"));
		assert!(joined.contains("-ac 1"));
		assert!(joined.ends_with("/o.wav"));
	}
}
