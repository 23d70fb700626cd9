mod config;
mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use audio_pipeline::PreprocessingPipeline;
use clap::Parser;
use csv_batch::{BatchProcessor, YoutubeDownloader};
use job_events::Broadcaster;
use job_store::JobStore;
use model_registry::ModelRegistry;
use orchestrator::{Orchestrator, WebhookDispatcher};
use sqlx::sqlite::SqlitePoolOptions;
use task_queue::TaskQueue;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use http::AppState;

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();

	let config = Config::parse();
	config.validate().map_err(|e| anyhow::anyhow!(e))?;
	init_tracing(&config);

	// Fatal startup errors (database, listener) surface as a nonzero exit.
	let db = SqlitePoolOptions::new()
		.max_connections(5)
		.connect(&config.database_url)
		.await
		.context("could not connect to database_url")?;

	let store = JobStore::new(db);
	store.migrate().await.context("could not initialize schema")?;

	for dir in [config.uploads_dir(), config.batches_dir(), config.temp_dir()] {
		tokio::fs::create_dir_all(&dir).await.with_context(|| format!("could not create {}", dir.display()))?;
	}

	let registry = Arc::new(build_registry(&config));
	let broadcaster = Broadcaster::with_capacity(config.sse_buffer);
	let pipeline = PreprocessingPipeline::standard(config.temp_dir());
	let webhooks = WebhookDispatcher::new(config.webhook_attempts, config.webhook_backoff);

	let orchestrator = Arc::new(Orchestrator::new(
		store.clone(),
		broadcaster.clone(),
		Arc::clone(&registry),
		pipeline,
		webhooks,
	));

	let queue = TaskQueue::new(store.clone(), config.queue_config());
	let runner: Arc<dyn task_queue::JobRunner> = Arc::clone(&orchestrator) as Arc<dyn task_queue::JobRunner>;
	queue.start(runner);

	let batches = BatchProcessor::new(store.clone(), orchestrator, YoutubeDownloader::default());

	let listener = TcpListener::bind(&config.listen_addr)
		.await
		.with_context(|| format!("could not bind {}", config.listen_addr))?;
	info!(addr = %config.listen_addr, workers = queue.worker_count(), "scriberr listening");

	let state = AppState {
		store,
		queue: queue.clone(),
		broadcaster: broadcaster.clone(),
		batches,
		config: Arc::new(config),
	};

	http::serve(state, listener, shutdown_signal()).await?;

	info!("draining workers");
	queue.shutdown().await;
	broadcaster.shutdown();
	info!("shutdown complete");
	Ok(())
}

fn build_registry(config: &Config) -> ModelRegistry {
	let mut registry = ModelRegistry::new();
	registry.register(Arc::new(adapters::builtin::whisper(&config.data_root, "tiny", 1000, 0.5)));
	registry.register(Arc::new(adapters::builtin::whisper(&config.data_root, "small", 2000, 0.9)));
	registry.register(Arc::new(adapters::builtin::whisper(&config.data_root, "medium", 5000, 1.8)));
	registry.register(Arc::new(adapters::builtin::pyannote(&config.data_root)));
	registry.register(Arc::new(adapters::builtin::whisperx(&config.data_root)));
	registry
}

fn init_tracing(config: &Config) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	if config.log_json {
		tracing_subscriber::fmt().json().with_env_filter(filter).init();
	} else {
		tracing_subscriber::fmt().with_env_filter(filter).init();
	}
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
	info!("shutdown signal received");
}
