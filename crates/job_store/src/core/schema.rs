use sqlx::SqlitePool;

use crate::error::Result;

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS transcription_jobs (
            id TEXT PRIMARY KEY,
            audio_path TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            status TEXT NOT NULL,
            language TEXT,
            parameters TEXT NOT NULL,
            profile_id TEXT,
            is_multi_track INTEGER NOT NULL DEFAULT 0,
            aup_file_path TEXT,
            multi_track_folder TEXT,
            merge_status TEXT,
            transcript TEXT,
            diarization TEXT,
            error_message TEXT,
            webhook_url TEXT,
            created_at DATETIME NOT NULL,
            started_at DATETIME,
            completed_at DATETIME
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS transcription_profiles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            parameters TEXT NOT NULL,
            created_at DATETIME NOT NULL
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS job_executions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            attempt INTEGER NOT NULL,
            adapter_id TEXT,
            adapter_version TEXT,
            started_at DATETIME NOT NULL,
            ended_at DATETIME,
            outcome TEXT,
            error_text TEXT,
            audio_seconds REAL,
            processing_seconds REAL,
            UNIQUE(job_id, attempt)
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS speaker_mappings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            original_speaker TEXT NOT NULL,
            display_label TEXT NOT NULL
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS multi_track_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            track_index INTEGER NOT NULL,
            file_path TEXT NOT NULL,
            filename TEXT NOT NULL,
            offset_seconds REAL NOT NULL DEFAULT 0,
            gain REAL NOT NULL DEFAULT 1,
            pan REAL NOT NULL DEFAULT 0,
            mute INTEGER NOT NULL DEFAULT 0,
            UNIQUE(job_id, track_index)
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS csv_batches (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            output_dir TEXT NOT NULL,
            total_rows INTEGER NOT NULL,
            current_row INTEGER NOT NULL DEFAULT 0,
            success_rows INTEGER NOT NULL DEFAULT 0,
            failed_rows INTEGER NOT NULL DEFAULT 0,
            parameters TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            started_at DATETIME,
            completed_at DATETIME
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS csv_batch_rows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id TEXT NOT NULL,
            row_num INTEGER NOT NULL,
            url TEXT NOT NULL,
            status TEXT NOT NULL,
            title TEXT,
            filename TEXT,
            audio_path TEXT,
            output_path TEXT,
            error_message TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME,
            UNIQUE(batch_id, row_num)
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON transcription_jobs(status)").execute(pool).await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_executions_job ON job_executions(job_id)").execute(pool).await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_rows_batch ON csv_batch_rows(batch_id)").execute(pool).await?;

	Ok(())
}

/// Installed after legacy speaker-mapping duplicates have been collapsed;
/// installing it first would make startup fail on old databases.
pub async fn init_unique_indexes(pool: &SqlitePool) -> Result<()> {
	sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_speaker_unique ON speaker_mappings(job_id, original_speaker)")
		.execute(pool)
		.await?;
	Ok(())
}
