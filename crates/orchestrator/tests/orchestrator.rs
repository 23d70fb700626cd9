use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adapters::{AdapterContext, AdapterError, AdapterKind, AudioInput, Capabilities, Feature, ModelAdapter, ParameterField, ParameterSchema, Segment, TranscriptResult};
use async_trait::async_trait;
use audio_pipeline::PreprocessingPipeline;
use job_events::{Broadcaster, EventKind};
use job_store::{CreateJob, ExecutionOutcome, JobStatus, JobStore};
use model_registry::ModelRegistry;
use orchestrator::{Orchestrator, WebhookDispatcher};
use sqlx::sqlite::SqlitePoolOptions;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Behavior {
	Succeed,
	BlockUntilCancelled,
}

struct TestAdapter {
	behavior: Behavior,
	with_speakers: bool,
	capabilities: Capabilities,
	schema: ParameterSchema,
	invocations: AtomicUsize,
}

impl TestAdapter {
	fn new(behavior: Behavior, with_speakers: bool) -> Arc<Self> {
		Arc::new(Self {
			behavior,
			with_speakers,
			capabilities: Capabilities {
				family: "test".to_string(),
				display_name: "Test Small".to_string(),
				languages: vec!["auto".to_string(), "en".to_string()],
				features: BTreeSet::from([Feature::Timestamps, Feature::Diarization]),
				memory_mb: 100,
				requires_gpu: false,
				metadata: BTreeMap::new(),
			},
			schema: ParameterSchema::new(vec![
				ParameterField::text("language"),
				ParameterField::text("model"),
				ParameterField::boolean("diarize"),
				ParameterField::integer("max_processing_time_s", Some(1), None),
			]),
			invocations: AtomicUsize::new(0),
		})
	}
}

#[async_trait]
impl ModelAdapter for TestAdapter {
	fn id(&self) -> &str {
		"test-small"
	}

	fn version(&self) -> &str {
		"1"
	}

	fn kind(&self) -> AdapterKind {
		AdapterKind::Composite
	}

	fn capabilities(&self) -> &Capabilities {
		&self.capabilities
	}

	fn parameter_schema(&self) -> &ParameterSchema {
		&self.schema
	}

	async fn prepare(&self) -> adapters::Result<()> {
		Ok(())
	}

	fn is_ready(&self) -> bool {
		true
	}

	fn estimate_processing_time(&self, _audio_seconds: f64) -> Duration {
		Duration::from_secs(1)
	}

	async fn invoke(&self, _input: &AudioInput, _params: &serde_json::Value, ctx: AdapterContext) -> adapters::Result<TranscriptResult> {
		self.invocations.fetch_add(1, Ordering::SeqCst);
		match self.behavior {
			Behavior::BlockUntilCancelled => {
				ctx.cancel.cancelled().await;
				Err(AdapterError::Cancelled)
			}
			Behavior::Succeed => {
				let speaker = |s: &str| self.with_speakers.then(|| s.to_string());
				Ok(TranscriptResult {
					text: "hello there general".to_string(),
					language: Some("en".to_string()),
					segments: vec![
						Segment {
							start: 0.0,
							end: 1.2,
							text: "hello there".to_string(),
							speaker: speaker("SPEAKER_00"),
							language: None,
						},
						Segment {
							start: 1.2,
							end: 2.0,
							text: "general".to_string(),
							speaker: speaker("SPEAKER_01"),
							language: None,
						},
					],
					words: None,
					confidence: Some(0.92),
					processing_seconds: 0.01,
					model_id: "test-small".to_string(),
					metadata: serde_json::Value::Null,
				})
			}
		}
	}
}

async fn test_store() -> JobStore {
	let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
	let store = JobStore::new(pool);
	store.migrate().await.unwrap();
	store
}

fn orchestrator_with(store: &JobStore, adapter: Option<Arc<TestAdapter>>) -> (Orchestrator, Broadcaster) {
	let mut registry = ModelRegistry::new();
	if let Some(adapter) = adapter {
		registry.register(adapter);
	}
	let broadcaster = Broadcaster::new();
	let orchestrator = Orchestrator::new(
		store.clone(),
		broadcaster.clone(),
		Arc::new(registry),
		PreprocessingPipeline::new(Vec::new()),
		WebhookDispatcher::new(1, Duration::from_millis(1)),
	);
	(orchestrator, broadcaster)
}

async fn pending_job(store: &JobStore, parameters: serde_json::Value) -> String {
	let job = store
		.create_job(CreateJob::single_track("/tmp/audio/clip.wav".to_string(), "clip.wav".to_string(), parameters))
		.await
		.unwrap();
	store.atomic_status_transition(&job.id, JobStatus::Uploaded, JobStatus::Pending).await.unwrap();
	job.id
}

#[tokio::test]
async fn happy_path_completes_and_notifies() {
	let store = test_store().await;
	let adapter = TestAdapter::new(Behavior::Succeed, false);
	let (orchestrator, broadcaster) = orchestrator_with(&store, Some(adapter.clone()));

	let job_id = pending_job(&store, serde_json::json!({"language": "en"})).await;
	let mut events = broadcaster.subscribe(&job_id);

	orchestrator.process(&job_id, CancellationToken::new()).await;

	let job = store.job(&job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Completed);
	assert!(job.error_message.is_none());
	let transcript = job.transcript.unwrap().0;
	assert_eq!(transcript["text"], "hello there general");
	assert!(job.started_at.unwrap() <= job.completed_at.unwrap());

	let executions = store.executions_for_job(&job_id).await.unwrap();
	assert_eq!(executions.len(), 1);
	assert_eq!(executions[0].outcome, Some(ExecutionOutcome::Ok));
	assert_eq!(executions[0].adapter_id.as_deref(), Some("test-small"));

	assert_eq!(events.recv().await.unwrap().kind, EventKind::Connected);
	assert_eq!(events.recv().await.unwrap().kind, EventKind::StatusChange);
	let completed = events.recv().await.unwrap();
	assert_eq!(completed.kind, EventKind::Completed);
	assert_eq!(completed.payload["summary"]["segments"], 2);
	assert_eq!(adapter.invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn diarized_results_seed_identity_speaker_mappings() {
	let store = test_store().await;
	let adapter = TestAdapter::new(Behavior::Succeed, true);
	let (orchestrator, _broadcaster) = orchestrator_with(&store, Some(adapter));

	let job_id = pending_job(&store, serde_json::json!({"diarize": true})).await;
	orchestrator.process(&job_id, CancellationToken::new()).await;

	let job = store.job(&job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Completed);
	assert!(job.diarization.is_some());

	let mappings = store.speakers_for_job(&job_id).await.unwrap();
	assert_eq!(mappings.len(), 2);
	assert_eq!(mappings[0].original_speaker, "SPEAKER_00");
	assert_eq!(mappings[0].display_label, "SPEAKER_00");
}

#[tokio::test]
async fn empty_registry_fails_with_no_suitable_model() {
	let store = test_store().await;
	let (orchestrator, _broadcaster) = orchestrator_with(&store, None);

	let job_id = pending_job(&store, serde_json::json!({"model": "does-not-exist"})).await;
	orchestrator.process(&job_id, CancellationToken::new()).await;

	let job = store.job(&job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Failed);
	assert!(job.error_message.unwrap().contains("no suitable model"));
	assert!(job.transcript.is_none());

	let executions = store.executions_for_job(&job_id).await.unwrap();
	assert_eq!(executions[0].outcome, Some(ExecutionOutcome::Error));
}

#[tokio::test]
async fn invalid_parameters_fail_before_any_invocation() {
	let store = test_store().await;
	let adapter = TestAdapter::new(Behavior::Succeed, false);
	let (orchestrator, _broadcaster) = orchestrator_with(&store, Some(adapter.clone()));

	let job_id = pending_job(&store, serde_json::json!({"temperature": 0.8})).await;
	orchestrator.process(&job_id, CancellationToken::new()).await;

	let job = store.job(&job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Failed);
	assert!(job.error_message.unwrap().contains("unknown parameter"));
	assert_eq!(adapter.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_mid_invoke_fails_with_cancelled() {
	let store = test_store().await;
	let adapter = TestAdapter::new(Behavior::BlockUntilCancelled, false);
	let (orchestrator, broadcaster) = orchestrator_with(&store, Some(adapter));
	let orchestrator = Arc::new(orchestrator);

	let job_id = pending_job(&store, serde_json::json!({})).await;
	let mut events = broadcaster.subscribe(&job_id);

	let cancel = CancellationToken::new();
	let task = {
		let orchestrator = Arc::clone(&orchestrator);
		let job_id = job_id.clone();
		let cancel = cancel.clone();
		tokio::spawn(async move { orchestrator.process(&job_id, cancel).await })
	};

	// Wait for the job to reach processing before signalling.
	assert_eq!(events.recv().await.unwrap().kind, EventKind::Connected);
	assert_eq!(events.recv().await.unwrap().kind, EventKind::StatusChange);
	cancel.cancel();
	task.await.unwrap();

	let job = store.job(&job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Failed);
	assert_eq!(job.error_message.as_deref(), Some("cancelled"));

	let executions = store.executions_for_job(&job_id).await.unwrap();
	assert_eq!(executions[0].outcome, Some(ExecutionOutcome::Cancelled));

	let failed = events.recv().await.unwrap();
	assert_eq!(failed.kind, EventKind::Failed);
	assert_eq!(failed.payload["error"], "cancelled");
}

#[tokio::test]
async fn max_processing_time_is_a_hard_deadline() {
	let store = test_store().await;
	let adapter = TestAdapter::new(Behavior::BlockUntilCancelled, false);
	let (orchestrator, _broadcaster) = orchestrator_with(&store, Some(adapter));

	let job_id = pending_job(&store, serde_json::json!({"max_processing_time_s": 1})).await;
	orchestrator.process(&job_id, CancellationToken::new()).await;

	let job = store.job(&job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Failed);
	assert!(job.error_message.unwrap().contains("exceeded max processing time"));
}

#[tokio::test]
async fn claiming_a_non_pending_job_releases_without_changes() {
	let store = test_store().await;
	let adapter = TestAdapter::new(Behavior::Succeed, false);
	let (orchestrator, _broadcaster) = orchestrator_with(&store, Some(adapter.clone()));

	let job = store
		.create_job(CreateJob::single_track("/tmp/a.wav".to_string(), "a.wav".to_string(), serde_json::json!({})))
		.await
		.unwrap();

	orchestrator.process(&job.id, CancellationToken::new()).await;

	let job = store.job(&job.id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Uploaded);
	assert_eq!(adapter.invocations.load(Ordering::SeqCst), 0);
	assert!(store.executions_for_job(&job.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn rerun_creates_a_second_execution() {
	let store = test_store().await;
	let adapter = TestAdapter::new(Behavior::Succeed, false);
	let (orchestrator, _broadcaster) = orchestrator_with(&store, Some(adapter));

	let job_id = pending_job(&store, serde_json::json!({})).await;
	orchestrator.process(&job_id, CancellationToken::new()).await;

	// Re-drive the completed job through the same machine.
	store.atomic_status_transition(&job_id, JobStatus::Completed, JobStatus::Pending).await.unwrap();
	orchestrator.process(&job_id, CancellationToken::new()).await;

	let executions = store.executions_for_job(&job_id).await.unwrap();
	assert_eq!(executions.len(), 2);
	assert_eq!(executions[1].attempt, 2);
	assert_eq!(store.job(&job_id).await.unwrap().unwrap().status, JobStatus::Completed);
}
