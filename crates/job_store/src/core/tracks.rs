use crate::core::model::{MultiTrackFile, NewMultiTrackFile};
use crate::error::Result;
use crate::JobStore;

impl JobStore {
	/// Replace a job's track metadata wholesale, as parsed from its project
	/// file. Delete and re-insert share a transaction.
	pub async fn replace_tracks(&self, job_id: &str, tracks: &[NewMultiTrackFile]) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM multi_track_files WHERE job_id = ?").bind(job_id).execute(&mut *tx).await?;

		for track in tracks {
			sqlx::query(
				r#"
                INSERT INTO multi_track_files (job_id, track_index, file_path, filename, offset_seconds, gain, pan, mute)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
			)
			.bind(job_id)
			.bind(track.track_index)
			.bind(&track.file_path)
			.bind(&track.filename)
			.bind(track.offset_seconds)
			.bind(track.gain)
			.bind(track.pan)
			.bind(track.mute)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(())
	}

	pub async fn tracks_for_job(&self, job_id: &str) -> Result<Vec<MultiTrackFile>> {
		let tracks = sqlx::query_as::<_, MultiTrackFile>(
			"SELECT id, job_id, track_index, file_path, filename, offset_seconds, gain, pan, mute FROM multi_track_files WHERE job_id = ? ORDER BY track_index ASC",
		)
		.bind(job_id)
		.fetch_all(&self.pool)
		.await?;
		Ok(tracks)
	}
}
