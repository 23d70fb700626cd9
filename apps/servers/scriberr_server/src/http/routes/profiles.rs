use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use job_store::TranscriptionProfile;
use serde::Deserialize;
use serde_json::json;

use crate::http::{AppState, Error, Result, ResultExt};

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/profiles", post(create_profile).get(list_profiles))
		.route("/profiles/:id", get(get_profile).delete(delete_profile))
}

#[derive(Deserialize)]
struct CreateProfileBody {
	name: String,
	description: Option<String>,
	parameters: serde_json::Value,
}

async fn create_profile(State(state): State<AppState>, Json(body): Json<CreateProfileBody>) -> Result<Json<TranscriptionProfile>> {
	if body.name.trim().is_empty() {
		return Err(Error::Validation("profile name must not be empty".to_string()));
	}
	if !body.parameters.is_object() {
		return Err(Error::Validation("parameters must be a JSON object".to_string()));
	}

	let profile = state
		.store
		.create_profile(body.name.trim(), body.description.as_deref(), body.parameters)
		.await
		.on_constraint("transcription_profiles.name", |_| Error::Conflict(format!("profile `{}` already exists", body.name.trim())))?;
	Ok(Json(profile))
}

async fn list_profiles(State(state): State<AppState>) -> Result<Json<Vec<TranscriptionProfile>>> {
	Ok(Json(state.store.list_profiles().await?))
}

async fn get_profile(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<TranscriptionProfile>> {
	let profile = state.store.profile(&id).await?.ok_or(Error::NotFound)?;
	Ok(Json(profile))
}

async fn delete_profile(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
	if !state.store.delete_profile(&id).await? {
		return Err(Error::NotFound);
	}
	Ok(Json(json!({"id": id, "deleted": true})))
}
