use axum::extract::{Multipart, Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::http::{AppState, Error, Result};

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/batches", post(create_batch).get(list_batches))
		.route("/batches/:id", get(get_batch))
		.route("/batches/:id/start", post(start_batch))
		.route("/batches/:id/stop", post(stop_batch))
}

async fn create_batch(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<serde_json::Value>> {
	let mut csv_bytes: Option<Vec<u8>> = None;
	let mut name = None;
	let mut parameters = json!({});

	while let Some(field) = multipart.next_field().await.map_err(|e| Error::Validation(e.to_string()))? {
		let field_name = field.name().unwrap_or_default().to_string();
		match field_name.as_str() {
			"file" => {
				csv_bytes = Some(field.bytes().await.map_err(|e| Error::Validation(e.to_string()))?.to_vec());
			}
			"name" => name = Some(field.text().await.map_err(|e| Error::Validation(e.to_string()))?),
			"parameters" => {
				let text = field.text().await.map_err(|e| Error::Validation(e.to_string()))?;
				parameters = serde_json::from_str(&text).map_err(|e| Error::Validation(format!("parameters are not valid JSON: {e}")))?;
			}
			_ => {}
		}
	}

	let csv_bytes = csv_bytes.ok_or_else(|| Error::Validation("missing `file` field".to_string()))?;
	let name = name.unwrap_or_else(|| "batch".to_string());
	let output_dir = state.config.batches_dir().join(Uuid::new_v4().to_string());

	let batch = state.batches.create_batch(&name, &csv_bytes, parameters, &output_dir).await?;
	Ok(Json(json!({"id": batch.id, "total_rows": batch.total_rows, "status": batch.status})))
}

async fn list_batches(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
	let batches = state.store.list_batches().await?;
	Ok(Json(json!({ "batches": batches })))
}

async fn get_batch(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
	let batch = state.store.batch(&id).await?.ok_or(Error::NotFound)?;
	let rows = state.store.rows_for_batch(&id).await?;
	Ok(Json(json!({"batch": batch, "rows": rows})))
}

async fn start_batch(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
	state.batches.start(&id).await?;
	Ok(Json(json!({"id": id, "status": "processing"})))
}

async fn stop_batch(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
	state.batches.stop(&id)?;
	Ok(Json(json!({"id": id, "stopping": true})))
}
