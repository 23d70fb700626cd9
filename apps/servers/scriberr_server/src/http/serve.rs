use std::future::Future;
use std::sync::Arc;

use axum::Router;
use csv_batch::BatchProcessor;
use job_events::Broadcaster;
use job_store::JobStore;
use task_queue::TaskQueue;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::http::routes;

#[derive(Clone)]
pub struct AppState {
	pub store: JobStore,
	pub queue: TaskQueue,
	pub broadcaster: Broadcaster,
	pub batches: BatchProcessor,
	pub config: Arc<Config>,
}

#[must_use]
pub fn api_router(state: AppState) -> Router {
	Router::new()
		.merge(routes::jobs::routes())
		.merge(routes::batches::routes())
		.merge(routes::profiles::routes())
		.merge(routes::events::routes())
		.merge(routes::health::routes())
		.with_state(state)
}

/// Serve until the shutdown future resolves; the caller tears down the
/// queue and broadcaster afterwards.
pub async fn serve(state: AppState, listener: TcpListener, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
	let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any).allow_origin(Any);
	let app = api_router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors));

	tracing::debug!("listening on {}", listener.local_addr()?);
	axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
	Ok(())
}
