use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use crate::core::model::{CreateJob, JobStatus, TranscriptionJob, UpdateJob};
use crate::error::{Result, StoreError};
use crate::JobStore;

const JOB_COLUMNS: &str = "id, audio_path, original_filename, status, language, parameters, profile_id, is_multi_track, \
     aup_file_path, multi_track_folder, merge_status, transcript, diarization, error_message, webhook_url, \
     created_at, started_at, completed_at";

impl JobStore {
	pub async fn create_job(&self, new: CreateJob) -> Result<TranscriptionJob> {
		let id = Uuid::new_v4().to_string();
		let created_at = Utc::now();
		let parameters = Json(new.parameters);

		sqlx::query(
			r#"
            INSERT INTO transcription_jobs (
                id, audio_path, original_filename, status, language, parameters, profile_id,
                is_multi_track, aup_file_path, multi_track_folder, webhook_url, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&id)
		.bind(&new.audio_path)
		.bind(&new.original_filename)
		.bind(JobStatus::Uploaded)
		.bind(&new.language)
		.bind(&parameters)
		.bind(&new.profile_id)
		.bind(new.is_multi_track)
		.bind(&new.aup_file_path)
		.bind(&new.multi_track_folder)
		.bind(&new.webhook_url)
		.bind(created_at)
		.execute(&self.pool)
		.await?;

		Ok(TranscriptionJob {
			id,
			audio_path: new.audio_path,
			original_filename: new.original_filename,
			status: JobStatus::Uploaded,
			language: new.language,
			parameters,
			profile_id: new.profile_id,
			is_multi_track: new.is_multi_track,
			aup_file_path: new.aup_file_path,
			multi_track_folder: new.multi_track_folder,
			merge_status: None,
			transcript: None,
			diarization: None,
			error_message: None,
			webhook_url: new.webhook_url,
			created_at,
			started_at: None,
			completed_at: None,
		})
	}

	pub async fn job(&self, id: &str) -> Result<Option<TranscriptionJob>> {
		let job = sqlx::query_as::<_, TranscriptionJob>(&format!("SELECT {JOB_COLUMNS} FROM transcription_jobs WHERE id = ?"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(job)
	}

	pub async fn list_jobs(&self, status: Option<JobStatus>, limit: i64) -> Result<Vec<TranscriptionJob>> {
		let jobs = match status {
			Some(status) => {
				sqlx::query_as::<_, TranscriptionJob>(&format!(
					"SELECT {JOB_COLUMNS} FROM transcription_jobs WHERE status = ? ORDER BY created_at DESC LIMIT ?"
				))
				.bind(status)
				.bind(limit)
				.fetch_all(&self.pool)
				.await?
			}
			None => {
				sqlx::query_as::<_, TranscriptionJob>(&format!("SELECT {JOB_COLUMNS} FROM transcription_jobs ORDER BY created_at DESC LIMIT ?"))
					.bind(limit)
					.fetch_all(&self.pool)
					.await?
			}
		};
		Ok(jobs)
	}

	/// Apply a partial update. Touched columns are written inside one
	/// transaction so a partially applied patch is never visible.
	pub async fn update_job(&self, id: &str, patch: UpdateJob) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		if let Some(audio_path) = patch.audio_path.as_ref() {
			sqlx::query("UPDATE transcription_jobs SET audio_path = ? WHERE id = ?")
				.bind(audio_path)
				.bind(id)
				.execute(&mut *tx)
				.await?;
		}
		if let Some(language) = patch.language.as_ref() {
			sqlx::query("UPDATE transcription_jobs SET language = ? WHERE id = ?")
				.bind(language)
				.bind(id)
				.execute(&mut *tx)
				.await?;
		}
		if let Some(merge_status) = patch.merge_status {
			sqlx::query("UPDATE transcription_jobs SET merge_status = ? WHERE id = ?")
				.bind(merge_status)
				.bind(id)
				.execute(&mut *tx)
				.await?;
		}
		if let Some(transcript) = patch.transcript {
			sqlx::query("UPDATE transcription_jobs SET transcript = ? WHERE id = ?")
				.bind(Json(transcript))
				.bind(id)
				.execute(&mut *tx)
				.await?;
		}
		if let Some(diarization) = patch.diarization {
			sqlx::query("UPDATE transcription_jobs SET diarization = ? WHERE id = ?")
				.bind(Json(diarization))
				.bind(id)
				.execute(&mut *tx)
				.await?;
		}
		if let Some(error_message) = patch.error_message.as_ref() {
			sqlx::query("UPDATE transcription_jobs SET error_message = ? WHERE id = ?")
				.bind(error_message)
				.bind(id)
				.execute(&mut *tx)
				.await?;
		}
		if let Some(started_at) = patch.started_at {
			sqlx::query("UPDATE transcription_jobs SET started_at = ? WHERE id = ?")
				.bind(started_at)
				.bind(id)
				.execute(&mut *tx)
				.await?;
		}
		if let Some(completed_at) = patch.completed_at {
			sqlx::query("UPDATE transcription_jobs SET completed_at = ? WHERE id = ?")
				.bind(completed_at)
				.bind(id)
				.execute(&mut *tx)
				.await?;
		}

		tx.commit().await?;
		Ok(())
	}

	/// Compare-and-swap on the status column. Fails with [`StoreError::Stale`]
	/// when the row is no longer in `from`, which is how the orchestrator
	/// avoids resurrecting cancelled jobs.
	pub async fn atomic_status_transition(&self, id: &str, from: JobStatus, to: JobStatus) -> Result<()> {
		let result = sqlx::query("UPDATE transcription_jobs SET status = ? WHERE id = ? AND status = ?")
			.bind(to)
			.bind(id)
			.bind(from)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 1 {
			return Ok(());
		}

		let actual = sqlx::query_scalar::<_, JobStatus>("SELECT status FROM transcription_jobs WHERE id = ?")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		match actual {
			Some(actual) => Err(StoreError::Stale {
				expected: from.as_str().to_string(),
				actual: actual.as_str().to_string(),
			}),
			None => Err(StoreError::NotFound),
		}
	}

	/// Delete a job together with its executions, mappings, and tracks.
	pub async fn delete_job(&self, id: &str) -> Result<bool> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM job_executions WHERE job_id = ?").bind(id).execute(&mut *tx).await?;
		sqlx::query("DELETE FROM speaker_mappings WHERE job_id = ?").bind(id).execute(&mut *tx).await?;
		sqlx::query("DELETE FROM multi_track_files WHERE job_id = ?").bind(id).execute(&mut *tx).await?;
		let result = sqlx::query("DELETE FROM transcription_jobs WHERE id = ?").bind(id).execute(&mut *tx).await?;

		tx.commit().await?;
		Ok(result.rows_affected() > 0)
	}

	/// Pending jobs for the queue reconciler, oldest first.
	pub async fn find_pending_for_scanner(&self, limit: i64) -> Result<Vec<String>> {
		let ids = sqlx::query_scalar::<_, String>("SELECT id FROM transcription_jobs WHERE status = ? ORDER BY created_at ASC LIMIT ?")
			.bind(JobStatus::Pending)
			.bind(limit)
			.fetch_all(&self.pool)
			.await?;
		Ok(ids)
	}

	pub async fn count_with_status(&self, status: JobStatus) -> Result<i64> {
		let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transcription_jobs WHERE status = ?")
			.bind(status)
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}
}
