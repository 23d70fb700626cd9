use chrono::Utc;

use crate::core::model::{ExecutionOutcome, JobExecution};
use crate::error::Result;
use crate::JobStore;

const EXECUTION_COLUMNS: &str = "id, job_id, attempt, adapter_id, adapter_version, started_at, ended_at, outcome, error_text, audio_seconds, processing_seconds";

impl JobStore {
	/// Open a new attempt record. Attempt numbers are strictly increasing
	/// per job; the MAX+1 read and the insert share a transaction.
	pub async fn begin_execution(&self, job_id: &str) -> Result<JobExecution> {
		let mut tx = self.pool.begin().await?;

		let attempt = sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(attempt), 0) + 1 FROM job_executions WHERE job_id = ?")
			.bind(job_id)
			.fetch_one(&mut *tx)
			.await?;

		let started_at = Utc::now();
		let id = sqlx::query("INSERT INTO job_executions (job_id, attempt, started_at) VALUES (?, ?, ?)")
			.bind(job_id)
			.bind(attempt)
			.bind(started_at)
			.execute(&mut *tx)
			.await?
			.last_insert_rowid();

		tx.commit().await?;

		Ok(JobExecution {
			id,
			job_id: job_id.to_string(),
			attempt,
			adapter_id: None,
			adapter_version: None,
			started_at,
			ended_at: None,
			outcome: None,
			error_text: None,
			audio_seconds: None,
			processing_seconds: None,
		})
	}

	pub async fn set_execution_adapter(&self, execution_id: i64, adapter_id: &str, adapter_version: &str) -> Result<()> {
		sqlx::query("UPDATE job_executions SET adapter_id = ?, adapter_version = ? WHERE id = ?")
			.bind(adapter_id)
			.bind(adapter_version)
			.bind(execution_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn finish_execution(
		&self,
		execution_id: i64,
		outcome: ExecutionOutcome,
		error_text: Option<&str>,
		audio_seconds: Option<f64>,
		processing_seconds: Option<f64>,
	) -> Result<()> {
		sqlx::query("UPDATE job_executions SET ended_at = ?, outcome = ?, error_text = ?, audio_seconds = ?, processing_seconds = ? WHERE id = ?")
			.bind(Utc::now())
			.bind(outcome)
			.bind(error_text)
			.bind(audio_seconds)
			.bind(processing_seconds)
			.bind(execution_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn executions_for_job(&self, job_id: &str) -> Result<Vec<JobExecution>> {
		let executions = sqlx::query_as::<_, JobExecution>(&format!("SELECT {EXECUTION_COLUMNS} FROM job_executions WHERE job_id = ? ORDER BY attempt ASC"))
			.bind(job_id)
			.fetch_all(&self.pool)
			.await?;
		Ok(executions)
	}
}
