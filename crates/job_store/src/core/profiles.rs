use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use crate::core::model::TranscriptionProfile;
use crate::error::Result;
use crate::JobStore;

const PROFILE_COLUMNS: &str = "id, name, description, parameters, created_at";

impl JobStore {
	pub async fn create_profile(&self, name: &str, description: Option<&str>, parameters: serde_json::Value) -> Result<TranscriptionProfile> {
		let id = Uuid::new_v4().to_string();
		let created_at = Utc::now();
		let parameters = Json(parameters);

		sqlx::query("INSERT INTO transcription_profiles (id, name, description, parameters, created_at) VALUES (?, ?, ?, ?, ?)")
			.bind(&id)
			.bind(name)
			.bind(description)
			.bind(&parameters)
			.bind(created_at)
			.execute(&self.pool)
			.await?;

		Ok(TranscriptionProfile {
			id,
			name: name.to_string(),
			description: description.map(ToString::to_string),
			parameters,
			created_at,
		})
	}

	pub async fn profile(&self, id: &str) -> Result<Option<TranscriptionProfile>> {
		let profile = sqlx::query_as::<_, TranscriptionProfile>(&format!("SELECT {PROFILE_COLUMNS} FROM transcription_profiles WHERE id = ?"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(profile)
	}

	pub async fn list_profiles(&self) -> Result<Vec<TranscriptionProfile>> {
		let profiles = sqlx::query_as::<_, TranscriptionProfile>(&format!("SELECT {PROFILE_COLUMNS} FROM transcription_profiles ORDER BY name ASC"))
			.fetch_all(&self.pool)
			.await?;
		Ok(profiles)
	}

	pub async fn delete_profile(&self, id: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM transcription_profiles WHERE id = ?").bind(id).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}
}
