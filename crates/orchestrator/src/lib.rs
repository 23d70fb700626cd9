pub mod requirements;
pub mod webhook;

pub use requirements::requirements_from_parameters;
pub use webhook::WebhookDispatcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use adapters::{AdapterContext, AdapterError, AudioInput, ProgressUpdate, TranscriptResult};
use async_trait::async_trait;
use audio_pipeline::{flatten_tracks, merge_tracks, parse_project, PreprocessingPipeline};
use chrono::Utc;
use job_events::{Broadcaster, EventKind};
use job_store::{ExecutionOutcome, JobParameters, JobStatus, JobStore, MergeStatus, NewMultiTrackFile, TranscriptionJob, UpdateJob};
use model_registry::ModelRegistry;
use serde_json::json;
use task_queue::JobRunner;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const STORE_RETRY_BACKOFF: Duration = Duration::from_millis(500);

enum JobFailure {
	Cancelled,
	Message(String),
}

struct Driven {
	result: TranscriptResult,
	audio_seconds: Option<f64>,
}

/// Owns the per-job state machine: claimed jobs are driven through
/// preprocessing, adapter invocation, and persistence, with every outcome
/// fanned out to the broadcaster and an optional webhook.
pub struct Orchestrator {
	store: JobStore,
	broadcaster: Broadcaster,
	registry: Arc<ModelRegistry>,
	pipeline: PreprocessingPipeline,
	webhooks: WebhookDispatcher,
}

impl Orchestrator {
	#[must_use]
	pub fn new(store: JobStore, broadcaster: Broadcaster, registry: Arc<ModelRegistry>, pipeline: PreprocessingPipeline, webhooks: WebhookDispatcher) -> Self {
		Self {
			store,
			broadcaster,
			registry,
			pipeline,
			webhooks,
		}
	}

	pub async fn process(&self, job_id: &str, cancel: CancellationToken) {
		let job = match self.store.job(job_id).await {
			Ok(Some(job)) => job,
			Ok(None) => {
				debug!(job_id, "claimed job no longer exists, releasing");
				return;
			}
			Err(e) => {
				error!(job_id, error = %e, "could not load claimed job");
				return;
			}
		};

		if job.status != JobStatus::Pending {
			debug!(job_id, status = job.status.as_str(), "claimed job is not pending, releasing");
			return;
		}
		if self.store.atomic_status_transition(job_id, JobStatus::Pending, JobStatus::Processing).await.is_err() {
			debug!(job_id, "lost the claim race, releasing");
			return;
		}

		let _ = self
			.store
			.update_job(
				job_id,
				UpdateJob {
					started_at: Some(Utc::now()),
					..UpdateJob::default()
				},
			)
			.await;
		self.broadcaster.publish(job_id, EventKind::StatusChange, json!({"to": "processing"}));

		let execution = match self.store.begin_execution(job_id).await {
			Ok(execution) => execution,
			Err(e) => {
				self.fail(&job, None, &format!("could not record execution: {e}"), ExecutionOutcome::Error).await;
				return;
			}
		};

		let mut temp_paths = Vec::new();
		let outcome = self.drive(&job, execution.id, &cancel, &mut temp_paths).await;
		self.cleanup(&temp_paths).await;

		match outcome {
			Ok(driven) => self.complete(&job, execution.id, driven).await,
			Err(JobFailure::Cancelled) => self.fail(&job, Some(execution.id), "cancelled", ExecutionOutcome::Cancelled).await,
			Err(JobFailure::Message(message)) => self.fail(&job, Some(execution.id), &message, ExecutionOutcome::Error).await,
		}
	}

	async fn drive(&self, job: &TranscriptionJob, execution_id: i64, cancel: &CancellationToken, temp_paths: &mut Vec<PathBuf>) -> Result<Driven, JobFailure> {
		if cancel.is_cancelled() {
			return Err(JobFailure::Cancelled);
		}

		let audio_path = if job.is_multi_track {
			self.prepare_multi_track(job, cancel).await?
		} else {
			PathBuf::from(&job.audio_path)
		};

		let params_value = job.parameters.0.clone();
		let typed = JobParameters::from_value(&params_value);
		let requirements = requirements_from_parameters(&typed, job.language.as_deref());

		let adapter = self.registry.select(&requirements).map_err(|e| JobFailure::Message(e.to_string()))?;
		adapter.validate_parameters(&params_value).map_err(|e| JobFailure::Message(e.to_string()))?;

		if !adapter.is_ready() {
			adapter
				.prepare()
				.await
				.map_err(|e| JobFailure::Message(format!("adapter {} unavailable: {e}", adapter.id())))?;
		}
		let _ = self.store.set_execution_adapter(execution_id, adapter.id(), adapter.version()).await;

		if cancel.is_cancelled() {
			return Err(JobFailure::Cancelled);
		}

		let pipeline_output = self.pipeline.run(AudioInput::from_path(&audio_path), adapter.capabilities(), cancel).await;
		temp_paths.extend(pipeline_output.temp_paths);
		let input = pipeline_output.input;
		let audio_seconds = input.duration_seconds;
		// The adapter's sidecar is an intermediate too, wherever it lands.
		temp_paths.push(input.sidecar_path());

		if cancel.is_cancelled() {
			return Err(JobFailure::Cancelled);
		}

		// Forward subprocess progress onto the job's topic for as long as
		// the invocation holds the channel open.
		let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressUpdate>();
		let broadcaster = self.broadcaster.clone();
		let progress_job = job.id.clone();
		tokio::spawn(async move {
			while let Some(update) = progress_rx.recv().await {
				broadcaster.publish(
					&progress_job,
					EventKind::Progress,
					json!({"fraction": update.fraction, "stage": update.stage}),
				);
			}
		});

		let invoke_cancel = cancel.child_token();
		let deadline = typed.max_processing_time_s.map(|secs| {
			let token = invoke_cancel.clone();
			tokio::spawn(async move {
				tokio::time::sleep(Duration::from_secs(secs.max(1) as u64)).await;
				token.cancel();
			})
		});

		let ctx = AdapterContext {
			cancel: invoke_cancel,
			progress: Some(progress_tx),
		};
		let invoked = adapter.invoke(&input, &params_value, ctx).await;
		if let Some(handle) = deadline {
			handle.abort();
		}

		match invoked {
			Ok(result) => Ok(Driven { result, audio_seconds }),
			Err(AdapterError::Cancelled) => {
				if cancel.is_cancelled() {
					Err(JobFailure::Cancelled)
				} else {
					Err(JobFailure::Message(format!(
						"exceeded max processing time of {}s",
						typed.max_processing_time_s.unwrap_or_default()
					)))
				}
			}
			Err(e) => Err(JobFailure::Message(e.to_string())),
		}
	}

	/// Parse the project file, refresh per-track metadata, and mix the
	/// tracks into one asset the rest of the pipeline consumes.
	async fn prepare_multi_track(&self, job: &TranscriptionJob, cancel: &CancellationToken) -> Result<PathBuf, JobFailure> {
		let _ = self
			.store
			.update_job(
				&job.id,
				UpdateJob {
					merge_status: Some(MergeStatus::Merging),
					..UpdateJob::default()
				},
			)
			.await;

		let merged = self.merge_project(job, cancel).await;

		match merged {
			Ok(path) => {
				let _ = self
					.store
					.update_job(
						&job.id,
						UpdateJob {
							merge_status: Some(MergeStatus::Completed),
							audio_path: Some(path.display().to_string()),
							..UpdateJob::default()
						},
					)
					.await;
				Ok(path)
			}
			Err(message) => {
				let _ = self
					.store
					.update_job(
						&job.id,
						UpdateJob {
							merge_status: Some(MergeStatus::Failed),
							..UpdateJob::default()
						},
					)
					.await;
				if cancel.is_cancelled() {
					Err(JobFailure::Cancelled)
				} else {
					Err(JobFailure::Message(format!("multi-track merge failed: {message}")))
				}
			}
		}
	}

	async fn merge_project(&self, job: &TranscriptionJob, cancel: &CancellationToken) -> Result<PathBuf, String> {
		let aup_path = job.aup_file_path.as_deref().ok_or("job has no project file")?;
		let folder = job.multi_track_folder.as_deref().ok_or("job has no track folder")?;

		let xml = tokio::fs::read_to_string(aup_path)
			.await
			.map_err(|e| format!("cannot read {aup_path}: {e}"))?;
		let tracks = parse_project(&xml).map_err(|e| e.to_string())?;
		let flattened = flatten_tracks(&tracks);
		if flattened.is_empty() {
			return Err("project file contains no imported tracks".to_string());
		}

		let rows: Vec<NewMultiTrackFile> = flattened
			.iter()
			.map(|t| NewMultiTrackFile {
				track_index: t.track_index,
				file_path: Path::new(folder).join(&t.filename).display().to_string(),
				filename: t.filename.clone(),
				offset_seconds: t.offset_seconds,
				gain: t.gain,
				pan: t.pan,
				mute: t.mute,
			})
			.collect();
		self.store.replace_tracks(&job.id, &rows).await.map_err(|e| e.to_string())?;

		let output = Path::new(folder).join("merged.wav");
		merge_tracks(&flattened, Path::new(folder), &output, cancel).await.map_err(|e| e.to_string())?;
		Ok(output)
	}

	async fn complete(&self, job: &TranscriptionJob, execution_id: i64, driven: Driven) {
		let job_id = job.id.as_str();
		let value = match driven.result.to_value() {
			Ok(value) => value,
			Err(e) => {
				self.fail(job, Some(execution_id), &format!("could not serialize transcript: {e}"), ExecutionOutcome::Error).await;
				return;
			}
		};

		let speakers: Vec<String> = driven.result.speakers().into_iter().collect();
		let diarization = driven.result.has_diarization().then(|| {
			let turns: Vec<_> = driven
				.result
				.segments
				.iter()
				.filter(|s| s.speaker.is_some())
				.map(|s| json!({"start": s.start, "end": s.end, "speaker": s.speaker}))
				.collect();
			json!({"speakers": speakers.clone(), "turns": turns})
		});

		if let Err(e) = self.persist_result(job_id, &value, driven.result.language.clone(), diarization).await {
			self.fail(job, Some(execution_id), &format!("could not persist transcript: {e}"), ExecutionOutcome::Error).await;
			return;
		}

		if !speakers.is_empty() {
			if let Err(e) = self.store.seed_speakers_if_empty(job_id, &speakers).await {
				warn!(job_id, error = %e, "could not seed speaker mappings");
			}
		}

		let _ = self
			.store
			.finish_execution(execution_id, ExecutionOutcome::Ok, None, driven.audio_seconds, Some(driven.result.processing_seconds))
			.await;

		if self.store.atomic_status_transition(job_id, JobStatus::Processing, JobStatus::Completed).await.is_err() {
			warn!(job_id, "job left processing before completion could be recorded");
			return;
		}

		let summary = json!({
			"language": driven.result.language,
			"segments": driven.result.segments.len(),
			"characters": driven.result.text.len(),
			"speakers": speakers,
		});
		info!(job_id, segments = driven.result.segments.len(), "job completed");
		self.broadcaster.publish(job_id, EventKind::Completed, json!({ "summary": summary.clone() }));

		if let Some(url) = &job.webhook_url {
			self.webhooks.dispatch(url.clone(), json!({"job_id": job_id, "status": "completed", "summary": summary}));
		}
	}

	/// One retry with backoff on a failed result write, then give up and
	/// fail the job.
	async fn persist_result(&self, job_id: &str, transcript: &serde_json::Value, language: Option<String>, diarization: Option<serde_json::Value>) -> job_store::Result<()> {
		let patch = || UpdateJob {
			transcript: Some(transcript.clone()),
			language: language.clone(),
			diarization: diarization.clone(),
			completed_at: Some(Utc::now()),
			..UpdateJob::default()
		};

		if let Err(first) = self.store.update_job(job_id, patch()).await {
			warn!(job_id, error = %first, "transcript write failed, retrying once");
			tokio::time::sleep(STORE_RETRY_BACKOFF).await;
			self.store.update_job(job_id, patch()).await?;
		}
		Ok(())
	}

	async fn fail(&self, job: &TranscriptionJob, execution_id: Option<i64>, message: &str, outcome: ExecutionOutcome) {
		let job_id = job.id.as_str();
		if self.store.atomic_status_transition(job_id, JobStatus::Processing, JobStatus::Failed).await.is_err() {
			debug!(job_id, "job left processing before failure could be recorded");
		}
		let _ = self
			.store
			.update_job(
				job_id,
				UpdateJob {
					error_message: Some(message.to_string()),
					completed_at: Some(Utc::now()),
					..UpdateJob::default()
				},
			)
			.await;
		if let Some(execution_id) = execution_id {
			let _ = self.store.finish_execution(execution_id, outcome, Some(message), None, None).await;
		}

		info!(job_id, message, "job failed");
		self.broadcaster.publish(job_id, EventKind::Failed, json!({"error": message}));
		if let Some(url) = &job.webhook_url {
			self.webhooks.dispatch(url.clone(), json!({"job_id": job_id, "status": "failed", "error": message}));
		}
	}

	/// Delete pipeline intermediates regardless of outcome.
	async fn cleanup(&self, temp_paths: &[PathBuf]) {
		for path in temp_paths {
			let _ = tokio::fs::remove_file(&path.with_extension("json")).await;
			if tokio::fs::remove_file(path).await.is_ok() {
				if let Some(parent) = path.parent() {
					let _ = tokio::fs::remove_dir(parent).await;
				}
			}
		}
	}
}

#[async_trait]
impl JobRunner for Orchestrator {
	async fn run_job(&self, job_id: &str, cancel: CancellationToken) {
		self.process(job_id, cancel).await;
	}
}
