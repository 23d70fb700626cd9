use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
	Uploaded,
	Pending,
	Processing,
	Completed,
	Failed,
	Removed,
}

impl JobStatus {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Removed)
	}

	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Uploaded => "uploaded",
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
			Self::Removed => "removed",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MergeStatus {
	Pending,
	Merging,
	Completed,
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExecutionOutcome {
	Ok,
	Error,
	Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
	Pending,
	Processing,
	Completed,
	Failed,
	Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}

/// Which atomically incremented batch counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchCounter {
	Success,
	Failed,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TranscriptionJob {
	pub id: String,
	pub audio_path: String,
	pub original_filename: String,
	pub status: JobStatus,
	pub language: Option<String>,
	pub parameters: Json<serde_json::Value>,
	pub profile_id: Option<String>,
	pub is_multi_track: bool,
	pub aup_file_path: Option<String>,
	pub multi_track_folder: Option<String>,
	pub merge_status: Option<MergeStatus>,
	pub transcript: Option<Json<serde_json::Value>>,
	pub diarization: Option<Json<serde_json::Value>>,
	pub error_message: Option<String>,
	pub webhook_url: Option<String>,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateJob {
	pub audio_path: String,
	pub original_filename: String,
	pub language: Option<String>,
	pub parameters: serde_json::Value,
	pub profile_id: Option<String>,
	pub is_multi_track: bool,
	pub aup_file_path: Option<String>,
	pub multi_track_folder: Option<String>,
	pub webhook_url: Option<String>,
}

impl CreateJob {
	#[must_use]
	pub fn single_track(audio_path: String, original_filename: String, parameters: serde_json::Value) -> Self {
		Self {
			audio_path,
			original_filename,
			language: None,
			parameters,
			profile_id: None,
			is_multi_track: false,
			aup_file_path: None,
			multi_track_folder: None,
			webhook_url: None,
		}
	}
}

/// Partial update applied by the orchestrator. `None` leaves a column
/// untouched; all touched columns are written in one transaction.
#[derive(Debug, Clone, Default)]
pub struct UpdateJob {
	pub audio_path: Option<String>,
	pub language: Option<String>,
	pub merge_status: Option<MergeStatus>,
	pub transcript: Option<serde_json::Value>,
	pub diarization: Option<serde_json::Value>,
	pub error_message: Option<String>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
}

/// Typed, lenient view over a job's parameter blob. Unknown keys are
/// ignored here; rejecting them is the adapter schema's job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
	pub language: Option<String>,
	pub model: Option<String>,
	pub device: Option<String>,
	pub diarize: Option<bool>,
	pub min_speakers: Option<i64>,
	pub max_speakers: Option<i64>,
	pub translate: Option<bool>,
	pub quality: Option<String>,
	pub max_memory_mb: Option<i64>,
	pub max_processing_time_s: Option<i64>,
}

impl JobParameters {
	#[must_use]
	pub fn from_value(value: &serde_json::Value) -> Self {
		serde_json::from_value(value.clone()).unwrap_or_default()
	}
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TranscriptionProfile {
	pub id: String,
	pub name: String,
	pub description: Option<String>,
	pub parameters: Json<serde_json::Value>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobExecution {
	pub id: i64,
	pub job_id: String,
	pub attempt: i64,
	pub adapter_id: Option<String>,
	pub adapter_version: Option<String>,
	pub started_at: DateTime<Utc>,
	pub ended_at: Option<DateTime<Utc>>,
	pub outcome: Option<ExecutionOutcome>,
	pub error_text: Option<String>,
	pub audio_seconds: Option<f64>,
	pub processing_seconds: Option<f64>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SpeakerMapping {
	pub id: i64,
	pub job_id: String,
	pub original_speaker: String,
	pub display_label: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MultiTrackFile {
	pub id: i64,
	pub job_id: String,
	pub track_index: i64,
	pub file_path: String,
	pub filename: String,
	pub offset_seconds: f64,
	pub gain: f64,
	pub pan: f64,
	pub mute: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMultiTrackFile {
	pub track_index: i64,
	pub file_path: String,
	pub filename: String,
	pub offset_seconds: f64,
	pub gain: f64,
	pub pan: f64,
	pub mute: bool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CsvBatch {
	pub id: String,
	pub name: String,
	pub status: BatchStatus,
	pub output_dir: String,
	pub total_rows: i64,
	pub current_row: i64,
	pub success_rows: i64,
	pub failed_rows: i64,
	pub parameters: Json<serde_json::Value>,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CsvBatchRow {
	pub id: i64,
	pub batch_id: String,
	pub row_num: i64,
	pub url: String,
	pub status: RowStatus,
	pub title: Option<String>,
	pub filename: Option<String>,
	pub audio_path: Option<String>,
	pub output_path: Option<String>,
	pub error_message: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminal_statuses() {
		assert!(JobStatus::Completed.is_terminal());
		assert!(JobStatus::Failed.is_terminal());
		assert!(JobStatus::Removed.is_terminal());
		assert!(!JobStatus::Uploaded.is_terminal());
		assert!(!JobStatus::Pending.is_terminal());
		assert!(!JobStatus::Processing.is_terminal());
	}

	#[test]
	fn parameters_ignore_unknown_keys() {
		let value = serde_json::json!({"language": "en", "quality": "best", "definitely_not_a_knob": 1});
		let params = JobParameters::from_value(&value);
		assert_eq!(params.language.as_deref(), Some("en"));
		assert_eq!(params.quality.as_deref(), Some("best"));
	}

	#[test]
	fn parameters_speaker_pair() {
		let value = serde_json::json!({"diarize": true, "min_speakers": 2, "max_speakers": 4});
		let params = JobParameters::from_value(&value);
		assert_eq!(params.diarize, Some(true));
		assert_eq!(params.min_speakers, Some(2));
		assert_eq!(params.max_speakers, Some(4));
	}
}
