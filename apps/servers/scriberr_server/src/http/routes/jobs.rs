use std::collections::HashMap;

use adapters::TranscriptResult;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use job_events::EventKind;
use job_store::{CreateJob, JobStatus, TranscriptionJob};
use serde::Deserialize;
use serde_json::json;
use task_queue::CancelOutcome;
use uuid::Uuid;

use crate::http::{srt, AppState, Error, Result};

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/jobs", post(create_job).get(list_jobs))
		.route("/jobs/:id", get(get_job).delete(delete_job))
		.route("/jobs/:id/submit", post(submit_job))
		.route("/jobs/:id/cancel", post(cancel_job))
		.route("/jobs/:id/transcript", get(get_transcript))
		.route("/jobs/:id/executions", get(list_executions))
		.route("/jobs/:id/speakers", get(list_speakers).patch(update_speakers))
}

struct Upload {
	filename: String,
	bytes: Vec<u8>,
}

async fn create_job(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<serde_json::Value>> {
	let mut upload: Option<Upload> = None;
	let mut parameters = serde_json::Map::new();
	let mut language = None;
	let mut profile_id = None;
	let mut webhook_url = None;

	while let Some(field) = multipart.next_field().await.map_err(|e| Error::Validation(e.to_string()))? {
		let name = field.name().unwrap_or_default().to_string();
		match name.as_str() {
			"file" => {
				let filename = field.file_name().unwrap_or("audio").to_string();
				let bytes = field.bytes().await.map_err(|e| Error::Validation(e.to_string()))?.to_vec();
				upload = Some(Upload { filename, bytes });
			}
			"parameters" => {
				let text = field.text().await.map_err(|e| Error::Validation(e.to_string()))?;
				match serde_json::from_str::<serde_json::Value>(&text) {
					Ok(serde_json::Value::Object(map)) => parameters = map,
					Ok(_) => return Err(Error::Validation("parameters must be a JSON object".to_string())),
					Err(e) => return Err(Error::Validation(format!("parameters are not valid JSON: {e}"))),
				}
			}
			"language" => language = Some(field.text().await.map_err(|e| Error::Validation(e.to_string()))?),
			"profile_id" => profile_id = Some(field.text().await.map_err(|e| Error::Validation(e.to_string()))?),
			"webhook_url" => webhook_url = Some(field.text().await.map_err(|e| Error::Validation(e.to_string()))?),
			_ => {}
		}
	}

	let upload = upload.ok_or_else(|| Error::Validation("missing `file` field".to_string()))?;
	if upload.bytes.is_empty() {
		return Err(Error::Validation("uploaded file is empty".to_string()));
	}

	// Jobs snapshot profile parameters at submit time; request knobs win
	// over the preset.
	let merged = if let Some(profile_id) = &profile_id {
		let profile = state
			.store
			.profile(profile_id)
			.await?
			.ok_or_else(|| Error::Validation(format!("unknown profile `{profile_id}`")))?;
		let mut base = profile.parameters.0.as_object().cloned().unwrap_or_default();
		for (key, value) in parameters {
			base.insert(key, value);
		}
		base
	} else {
		parameters
	};

	let upload_dir = state.config.uploads_dir().join(Uuid::new_v4().to_string());
	tokio::fs::create_dir_all(&upload_dir).await.map_err(|e| Error::Anyhow(e.into()))?;
	let audio_path = upload_dir.join(&upload.filename);
	tokio::fs::write(&audio_path, &upload.bytes).await.map_err(|e| Error::Anyhow(e.into()))?;

	let job = state
		.store
		.create_job(CreateJob {
			audio_path: audio_path.display().to_string(),
			original_filename: upload.filename,
			language,
			parameters: serde_json::Value::Object(merged),
			profile_id,
			is_multi_track: false,
			aup_file_path: None,
			multi_track_folder: None,
			webhook_url,
		})
		.await?;

	Ok(Json(json!({"id": job.id, "status": job.status})))
}

#[derive(Deserialize)]
struct ListQuery {
	status: Option<JobStatus>,
	limit: Option<i64>,
}

#[derive(serde::Serialize)]
struct JobSummary {
	id: String,
	original_filename: String,
	status: JobStatus,
	created_at: chrono::DateTime<chrono::Utc>,
	error_message: Option<String>,
}

impl From<TranscriptionJob> for JobSummary {
	fn from(job: TranscriptionJob) -> Self {
		Self {
			id: job.id,
			original_filename: job.original_filename,
			status: job.status,
			created_at: job.created_at,
			error_message: job.error_message,
		}
	}
}

async fn list_jobs(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Result<Json<Vec<JobSummary>>> {
	let jobs = state.store.list_jobs(query.status, query.limit.unwrap_or(50).clamp(1, 500)).await?;
	Ok(Json(jobs.into_iter().map(JobSummary::from).collect()))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<TranscriptionJob>> {
	let job = state.store.job(&id).await?.ok_or(Error::NotFound)?;
	Ok(Json(job))
}

async fn submit_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
	state.queue.submit(&id).await?;
	Ok(Json(json!({"id": id, "status": "pending"})))
}

async fn cancel_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
	match state.queue.cancel(&id).await? {
		CancelOutcome::Signalled => Ok(Json(json!({"id": id, "cancelled": true}))),
		CancelOutcome::Dequeued => {
			state.broadcaster.publish(&id, EventKind::Failed, json!({"error": "cancelled"}));
			Ok(Json(json!({"id": id, "cancelled": true})))
		}
		CancelOutcome::NotFound => {
			// Cancelling a terminal (or never-submitted) job is a no-op.
			let job = state.store.job(&id).await?.ok_or(Error::NotFound)?;
			Ok(Json(json!({"id": id, "cancelled": false, "status": job.status})))
		}
	}
}

#[derive(Deserialize)]
struct TranscriptQuery {
	format: Option<String>,
}

async fn get_transcript(State(state): State<AppState>, Path(id): Path<String>, Query(query): Query<TranscriptQuery>) -> Result<Response> {
	let job = state.store.job(&id).await?.ok_or(Error::NotFound)?;
	if job.status != JobStatus::Completed {
		return Err(Error::NotFound);
	}
	let transcript = job.transcript.ok_or(Error::NotFound)?.0;

	match query.format.as_deref().unwrap_or("json") {
		"json" => Ok(Json(transcript).into_response()),
		"txt" => {
			let result = TranscriptResult::from_value(&transcript).map_err(|e| Error::Anyhow(e.into()))?;
			Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], result.text).into_response())
		}
		"srt" => {
			let result = TranscriptResult::from_value(&transcript).map_err(|e| Error::Anyhow(e.into()))?;
			let labels: HashMap<String, String> = state
				.store
				.speakers_for_job(&id)
				.await?
				.into_iter()
				.map(|m| (m.original_speaker, m.display_label))
				.collect();
			Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], srt::render_srt(&result, &labels)).into_response())
		}
		other => Err(Error::Validation(format!("unsupported format `{other}`"))),
	}
}

async fn delete_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
	let job = state.store.job(&id).await?.ok_or(Error::NotFound)?;
	if job.status == JobStatus::Processing {
		return Err(Error::Conflict("cannot delete a processing job".to_string()));
	}

	// Mark removal before touching disk so concurrent readers observe a
	// terminal state rather than a half-deleted job.
	let _ = state.store.atomic_status_transition(&id, job.status, JobStatus::Removed).await;

	let audio_path = std::path::PathBuf::from(&job.audio_path);
	let _ = tokio::fs::remove_file(&audio_path).await;
	if let Some(parent) = audio_path.parent() {
		let _ = tokio::fs::remove_dir(parent).await;
	}
	if let Some(aup) = &job.aup_file_path {
		let _ = tokio::fs::remove_file(aup).await;
	}

	state.store.delete_job(&id).await?;
	Ok(Json(json!({"id": id, "deleted": true})))
}

async fn list_executions(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
	state.store.job(&id).await?.ok_or(Error::NotFound)?;
	let executions = state.store.executions_for_job(&id).await?;
	Ok(Json(json!({"job_id": id, "executions": executions})))
}

async fn list_speakers(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
	state.store.job(&id).await?.ok_or(Error::NotFound)?;
	let speakers = state.store.speakers_for_job(&id).await?;
	Ok(Json(json!({"job_id": id, "speakers": speakers})))
}

#[derive(Deserialize)]
struct SpeakerPatch {
	original_speaker: String,
	display_label: String,
}

#[derive(Deserialize)]
struct SpeakersBody {
	mappings: Vec<SpeakerPatch>,
}

async fn update_speakers(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<SpeakersBody>) -> Result<Json<serde_json::Value>> {
	state.store.job(&id).await?.ok_or(Error::NotFound)?;

	for mapping in &body.mappings {
		if mapping.original_speaker.is_empty() || mapping.display_label.is_empty() {
			return Err(Error::Validation("speaker mappings need both an original speaker and a label".to_string()));
		}
		state.store.upsert_speaker(&id, &mapping.original_speaker, &mapping.display_label).await?;
	}

	let speakers = state.store.speakers_for_job(&id).await?;
	Ok(Json(json!({"job_id": id, "speakers": speakers})))
}
