use crate::core::model::SpeakerMapping;
use crate::error::Result;
use crate::JobStore;

impl JobStore {
	/// Seed identity labels for freshly diarized speakers. A no-op when the
	/// job already has mappings, so user relabels survive re-runs.
	pub async fn seed_speakers_if_empty(&self, job_id: &str, speakers: &[String]) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM speaker_mappings WHERE job_id = ?")
			.bind(job_id)
			.fetch_one(&mut *tx)
			.await?;

		if existing == 0 {
			for speaker in speakers {
				sqlx::query("INSERT INTO speaker_mappings (job_id, original_speaker, display_label) VALUES (?, ?, ?)")
					.bind(job_id)
					.bind(speaker)
					.bind(speaker)
					.execute(&mut *tx)
					.await?;
			}
		}

		tx.commit().await?;
		Ok(())
	}

	pub async fn upsert_speaker(&self, job_id: &str, original_speaker: &str, display_label: &str) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO speaker_mappings (job_id, original_speaker, display_label)
            VALUES (?, ?, ?)
            ON CONFLICT(job_id, original_speaker) DO UPDATE SET display_label = excluded.display_label
            "#,
		)
		.bind(job_id)
		.bind(original_speaker)
		.bind(display_label)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn speakers_for_job(&self, job_id: &str) -> Result<Vec<SpeakerMapping>> {
		let mappings =
			sqlx::query_as::<_, SpeakerMapping>("SELECT id, job_id, original_speaker, display_label FROM speaker_mappings WHERE job_id = ? ORDER BY original_speaker ASC")
				.bind(job_id)
				.fetch_all(&self.pool)
				.await?;
		Ok(mappings)
	}

	/// Legacy databases accumulated duplicate `(job_id, original_speaker)`
	/// rows. Keep the highest-id record of each group.
	pub async fn collapse_duplicate_speakers(&self) -> Result<u64> {
		let result = sqlx::query(
			r#"
            DELETE FROM speaker_mappings
            WHERE id NOT IN (
                SELECT MAX(id) FROM speaker_mappings GROUP BY job_id, original_speaker
            )
            "#,
		)
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected())
	}
}
