use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::http::{AppState, Result};

pub fn routes() -> Router<AppState> {
	Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
	Ok(Json(json!({
		"status": "ok",
		"queue_depth": state.queue.queued_count(),
		"jobs_in_flight": state.queue.inflight_count(),
		"worker_count": state.queue.worker_count(),
	})))
}
