use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use crate::core::model::{BatchCounter, BatchStatus, CsvBatch, CsvBatchRow, RowStatus};
use crate::error::Result;
use crate::JobStore;

const BATCH_COLUMNS: &str = "id, name, status, output_dir, total_rows, current_row, success_rows, failed_rows, parameters, created_at, started_at, completed_at";
const ROW_COLUMNS: &str = "id, batch_id, row_num, url, status, title, filename, audio_path, output_path, error_message, created_at, updated_at";

impl JobStore {
	/// Create a batch and all its rows in one transaction. Row numbers are
	/// assigned 1-based in input order.
	pub async fn create_batch_with_rows(&self, name: &str, output_dir: &str, parameters: serde_json::Value, urls: &[String]) -> Result<CsvBatch> {
		let id = Uuid::new_v4().to_string();
		let created_at = Utc::now();
		let parameters = Json(parameters);
		let total_rows = urls.len() as i64;

		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
            INSERT INTO csv_batches (id, name, status, output_dir, total_rows, parameters, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&id)
		.bind(name)
		.bind(BatchStatus::Pending)
		.bind(output_dir)
		.bind(total_rows)
		.bind(&parameters)
		.bind(created_at)
		.execute(&mut *tx)
		.await?;

		for (index, url) in urls.iter().enumerate() {
			sqlx::query("INSERT INTO csv_batch_rows (batch_id, row_num, url, status, created_at) VALUES (?, ?, ?, ?, ?)")
				.bind(&id)
				.bind(index as i64 + 1)
				.bind(url)
				.bind(RowStatus::Pending)
				.bind(created_at)
				.execute(&mut *tx)
				.await?;
		}

		tx.commit().await?;

		Ok(CsvBatch {
			id,
			name: name.to_string(),
			status: BatchStatus::Pending,
			output_dir: output_dir.to_string(),
			total_rows,
			current_row: 0,
			success_rows: 0,
			failed_rows: 0,
			parameters,
			created_at,
			started_at: None,
			completed_at: None,
		})
	}

	pub async fn batch(&self, id: &str) -> Result<Option<CsvBatch>> {
		let batch = sqlx::query_as::<_, CsvBatch>(&format!("SELECT {BATCH_COLUMNS} FROM csv_batches WHERE id = ?"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(batch)
	}

	pub async fn list_batches(&self) -> Result<Vec<CsvBatch>> {
		let batches = sqlx::query_as::<_, CsvBatch>(&format!("SELECT {BATCH_COLUMNS} FROM csv_batches ORDER BY created_at DESC"))
			.fetch_all(&self.pool)
			.await?;
		Ok(batches)
	}

	pub async fn mark_batch_processing(&self, id: &str) -> Result<()> {
		sqlx::query("UPDATE csv_batches SET status = ?, started_at = ? WHERE id = ?")
			.bind(BatchStatus::Processing)
			.bind(Utc::now())
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn mark_batch_terminal(&self, id: &str, status: BatchStatus) -> Result<()> {
		sqlx::query("UPDATE csv_batches SET status = ?, completed_at = ? WHERE id = ?")
			.bind(status)
			.bind(Utc::now())
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn set_batch_current_row(&self, id: &str, row_num: i64) -> Result<()> {
		sqlx::query("UPDATE csv_batches SET current_row = ? WHERE id = ?").bind(row_num).bind(id).execute(&self.pool).await?;
		Ok(())
	}

	/// Counter bumps are SQL expressions, never read-modify-write.
	pub async fn increment_batch_counter(&self, id: &str, counter: BatchCounter) -> Result<()> {
		let sql = match counter {
			BatchCounter::Success => "UPDATE csv_batches SET success_rows = success_rows + 1 WHERE id = ?",
			BatchCounter::Failed => "UPDATE csv_batches SET failed_rows = failed_rows + 1 WHERE id = ?",
		};
		sqlx::query(sql).bind(id).execute(&self.pool).await?;
		Ok(())
	}

	pub async fn rows_for_batch(&self, batch_id: &str) -> Result<Vec<CsvBatchRow>> {
		let rows = sqlx::query_as::<_, CsvBatchRow>(&format!("SELECT {ROW_COLUMNS} FROM csv_batch_rows WHERE batch_id = ? ORDER BY row_num ASC"))
			.bind(batch_id)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows)
	}

	/// Rows still awaiting processing, in processing order. Resumption is
	/// just this query on a restarted batch.
	pub async fn pending_rows(&self, batch_id: &str) -> Result<Vec<CsvBatchRow>> {
		let rows = sqlx::query_as::<_, CsvBatchRow>(&format!(
			"SELECT {ROW_COLUMNS} FROM csv_batch_rows WHERE batch_id = ? AND status = ? ORDER BY row_num ASC"
		))
		.bind(batch_id)
		.bind(RowStatus::Pending)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows)
	}

	pub async fn set_row_processing(&self, row_id: i64) -> Result<()> {
		sqlx::query("UPDATE csv_batch_rows SET status = ?, updated_at = ? WHERE id = ?")
			.bind(RowStatus::Processing)
			.bind(Utc::now())
			.bind(row_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn set_row_completed(&self, row_id: i64, title: &str, filename: &str, audio_path: &str, output_path: &str) -> Result<()> {
		sqlx::query("UPDATE csv_batch_rows SET status = ?, title = ?, filename = ?, audio_path = ?, output_path = ?, updated_at = ? WHERE id = ?")
			.bind(RowStatus::Completed)
			.bind(title)
			.bind(filename)
			.bind(audio_path)
			.bind(output_path)
			.bind(Utc::now())
			.bind(row_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn set_row_failed(&self, row_id: i64, error_message: &str) -> Result<()> {
		sqlx::query("UPDATE csv_batch_rows SET status = ?, error_message = ?, updated_at = ? WHERE id = ?")
			.bind(RowStatus::Failed)
			.bind(error_message)
			.bind(Utc::now())
			.bind(row_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}
