use std::path::{Path, PathBuf};

use adapters::subprocess::{run_capture_stdout, SubprocessSpec};
use tokio_util::sync::CancellationToken;

use crate::error::{BatchError, Result};

/// Thin wrapper over the external downloader binary.
#[derive(Clone)]
pub struct YoutubeDownloader {
	program: String,
}

impl Default for YoutubeDownloader {
	fn default() -> Self {
		Self::new("yt-dlp")
	}
}

impl YoutubeDownloader {
	#[must_use]
	pub fn new(program: &str) -> Self {
		Self {
			program: program.to_string(),
		}
	}

	pub async fn fetch_title(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
		let spec = SubprocessSpec::new(
			&self.program,
			vec![
				"--print".to_string(),
				"title".to_string(),
				"--skip-download".to_string(),
				"--no-playlist".to_string(),
				url.to_string(),
			],
		);
		let output = run_capture_stdout(&spec, cancel).await?;
		let title = output.lines().next().unwrap_or("").trim().to_string();
		if title.is_empty() {
			return Err(BatchError::Download(format!("no title for {url}")));
		}
		Ok(title)
	}

	/// Download a row's audio as `{row_num}.wav` inside the batch directory.
	pub async fn download_audio(&self, url: &str, dest_dir: &Path, row_num: i64, cancel: &CancellationToken) -> Result<PathBuf> {
		let template = dest_dir.join(format!("{row_num}.%(ext)s"));
		let spec = SubprocessSpec::new(
			&self.program,
			vec![
				"-x".to_string(),
				"--audio-format".to_string(),
				"wav".to_string(),
				"--no-playlist".to_string(),
				"-o".to_string(),
				template.display().to_string(),
				url.to_string(),
			],
		);
		run_capture_stdout(&spec, cancel).await?;

		let audio_path = dest_dir.join(format!("{row_num}.wav"));
		if !tokio::fs::try_exists(&audio_path).await.unwrap_or(false) {
			return Err(BatchError::Download(format!("downloader produced no audio for {url}")));
		}
		Ok(audio_path)
	}
}
