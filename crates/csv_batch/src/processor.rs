use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use job_store::{BatchCounter, BatchStatus, CreateJob, CsvBatch, CsvBatchRow, JobStatus, JobStore};
use orchestrator::Orchestrator;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{BatchError, Result};
use crate::url::{parse_csv_urls, sanitize_title};
use crate::youtube::YoutubeDownloader;

struct ProcessorInner {
	store: JobStore,
	orchestrator: Arc<Orchestrator>,
	downloader: YoutubeDownloader,
	/// Stop signals for running batches, delivered between rows.
	active: Mutex<HashMap<String, CancellationToken>>,
}

struct RowOutput {
	title: String,
	filename: String,
	audio_path: PathBuf,
	output_path: PathBuf,
}

/// Row-serial batch runner: fetch → download → drive the core pipeline →
/// emit a JSON sidecar, one row at a time in `row_num` order. A failed row
/// never aborts the batch.
#[derive(Clone)]
pub struct BatchProcessor {
	inner: Arc<ProcessorInner>,
}

impl BatchProcessor {
	#[must_use]
	pub fn new(store: JobStore, orchestrator: Arc<Orchestrator>, downloader: YoutubeDownloader) -> Self {
		Self {
			inner: Arc::new(ProcessorInner {
				store,
				orchestrator,
				downloader,
				active: Mutex::new(HashMap::new()),
			}),
		}
	}

	/// Validate URLs up front (invalid rows are discarded) and create the
	/// batch with all its rows atomically.
	pub async fn create_batch(&self, name: &str, csv_bytes: &[u8], parameters: serde_json::Value, output_dir: &Path) -> Result<CsvBatch> {
		let urls = parse_csv_urls(csv_bytes);
		if urls.is_empty() {
			return Err(BatchError::NoValidRows);
		}

		tokio::fs::create_dir_all(output_dir).await?;
		let batch = self
			.inner
			.store
			.create_batch_with_rows(name, &output_dir.display().to_string(), parameters, &urls)
			.await?;
		info!(batch_id = %batch.id, rows = batch.total_rows, "batch created");
		Ok(batch)
	}

	/// Start or resume a batch. Resumption selects rows still *pending*;
	/// a batch whose rows are all terminal completes immediately.
	pub async fn start(&self, batch_id: &str) -> Result<()> {
		let batch = self.inner.store.batch(batch_id).await?.ok_or(BatchError::NotFound)?;
		match batch.status {
			BatchStatus::Processing => return Err(BatchError::AlreadyRunning),
			BatchStatus::Completed => return Err(BatchError::AlreadyCompleted),
			BatchStatus::Pending | BatchStatus::Cancelled | BatchStatus::Failed => {}
		}

		let token = {
			let mut active = self.inner.active.lock().expect("batch active lock poisoned");
			if active.contains_key(batch_id) {
				return Err(BatchError::AlreadyRunning);
			}
			let token = CancellationToken::new();
			active.insert(batch_id.to_string(), token.clone());
			token
		};

		self.inner.store.mark_batch_processing(batch_id).await?;

		let processor = self.clone();
		tokio::spawn(async move {
			processor.run_rows(batch, token).await;
		});
		Ok(())
	}

	/// Cancel a running batch between rows. In-flight row work observes the
	/// same token through its job's cancellation context.
	pub fn stop(&self, batch_id: &str) -> Result<()> {
		let active = self.inner.active.lock().expect("batch active lock poisoned");
		match active.get(batch_id) {
			Some(token) => {
				info!(batch_id, "batch stop requested");
				token.cancel();
				Ok(())
			}
			None => Err(BatchError::NotFound),
		}
	}

	#[must_use]
	pub fn is_running(&self, batch_id: &str) -> bool {
		self.inner.active.lock().expect("batch active lock poisoned").contains_key(batch_id)
	}

	async fn run_rows(&self, batch: CsvBatch, token: CancellationToken) {
		let rows = match self.inner.store.pending_rows(&batch.id).await {
			Ok(rows) => rows,
			Err(e) => {
				warn!(batch_id = %batch.id, error = %e, "could not load batch rows");
				let _ = self.inner.store.mark_batch_terminal(&batch.id, BatchStatus::Failed).await;
				self.release(&batch.id);
				return;
			}
		};

		for row in rows {
			if token.is_cancelled() {
				info!(batch_id = %batch.id, "batch cancelled between rows");
				let _ = self.inner.store.mark_batch_terminal(&batch.id, BatchStatus::Cancelled).await;
				self.release(&batch.id);
				return;
			}

			let _ = self.inner.store.set_batch_current_row(&batch.id, row.row_num).await;
			let _ = self.inner.store.set_row_processing(row.id).await;

			match self.process_row(&batch, &row, &token).await {
				Ok(output) => {
					let _ = self
						.inner
						.store
						.set_row_completed(
							row.id,
							&output.title,
							&output.filename,
							&output.audio_path.display().to_string(),
							&output.output_path.display().to_string(),
						)
						.await;
					let _ = self.inner.store.increment_batch_counter(&batch.id, BatchCounter::Success).await;
				}
				Err(e) => {
					warn!(batch_id = %batch.id, row = row.row_num, error = %e, "row failed");
					let _ = self.inner.store.set_row_failed(row.id, &e.to_string()).await;
					let _ = self.inner.store.increment_batch_counter(&batch.id, BatchCounter::Failed).await;
				}
			}
		}

		// Completed even when some rows failed.
		let status = if token.is_cancelled() { BatchStatus::Cancelled } else { BatchStatus::Completed };
		let _ = self.inner.store.mark_batch_terminal(&batch.id, status).await;
		info!(batch_id = %batch.id, status = ?status, "batch finished");
		self.release(&batch.id);
	}

	fn release(&self, batch_id: &str) {
		self.inner.active.lock().expect("batch active lock poisoned").remove(batch_id);
	}

	async fn process_row(&self, batch: &CsvBatch, row: &CsvBatchRow, token: &CancellationToken) -> Result<RowOutput> {
		let output_dir = Path::new(&batch.output_dir);
		let title = self.inner.downloader.fetch_title(&row.url, token).await?;
		let audio_path = self.inner.downloader.download_audio(&row.url, output_dir, row.row_num, token).await?;
		let filename = audio_path.file_name().and_then(|n| n.to_str()).unwrap_or("audio.wav").to_string();

		// Hand the audio to the core pipeline synchronously with the
		// batch's parameters.
		let job = self
			.inner
			.store
			.create_job(CreateJob::single_track(audio_path.display().to_string(), filename.clone(), batch.parameters.0.clone()))
			.await?;
		self.inner.store.atomic_status_transition(&job.id, JobStatus::Uploaded, JobStatus::Pending).await?;
		self.inner.orchestrator.process(&job.id, token.child_token()).await;

		let finished = self.inner.store.job(&job.id).await?.ok_or(BatchError::NotFound)?;
		if finished.status != JobStatus::Completed {
			return Err(BatchError::Download(
				finished.error_message.unwrap_or_else(|| "transcription failed".to_string()),
			));
		}

		let output_path = output_dir.join(format!("{}-{}.json", row.row_num, sanitize_title(&title)));
		let sidecar = json!({
			"row_num": row.row_num,
			"url": row.url,
			"title": title,
			"job_id": job.id,
			"transcript": finished.transcript.map(|t| t.0),
		});
		tokio::fs::write(&output_path, serde_json::to_vec_pretty(&sidecar)?).await?;

		Ok(RowOutput {
			title,
			filename,
			audio_path,
			output_path,
		})
	}
}
