use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use job_store::{CreateJob, JobStatus, JobStore};
use sqlx::sqlite::SqlitePoolOptions;
use task_queue::{CancelOutcome, JobRunner, QueueConfig, QueueError, TaskQueue};
use tokio_util::sync::CancellationToken;

async fn test_store() -> JobStore {
	let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
	let store = JobStore::new(pool);
	store.migrate().await.unwrap();
	store
}

async fn make_job(store: &JobStore) -> String {
	store
		.create_job(CreateJob::single_track("/tmp/a.wav".to_string(), "a.wav".to_string(), serde_json::json!({})))
		.await
		.unwrap()
		.id
}

/// Records the jobs it ran; optionally blocks until its token cancels.
struct RecordingRunner {
	ran: Mutex<Vec<String>>,
	block_until_cancelled: bool,
}

impl RecordingRunner {
	fn new(block_until_cancelled: bool) -> Arc<Self> {
		Arc::new(Self {
			ran: Mutex::new(Vec::new()),
			block_until_cancelled,
		})
	}

	fn ran_jobs(&self) -> Vec<String> {
		self.ran.lock().unwrap().clone()
	}
}

#[async_trait]
impl JobRunner for RecordingRunner {
	async fn run_job(&self, job_id: &str, cancel: CancellationToken) {
		self.ran.lock().unwrap().push(job_id.to_string());
		if self.block_until_cancelled {
			cancel.cancelled().await;
		}
	}
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
	for _ in 0..200 {
		if condition() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("condition not reached within timeout");
}

#[tokio::test]
async fn submit_transitions_and_worker_claims() {
	let store = test_store().await;
	let queue = TaskQueue::new(store.clone(), QueueConfig::test());
	let runner = RecordingRunner::new(false);
	queue.start(runner.clone());

	let job_id = make_job(&store).await;
	queue.submit(&job_id).await.unwrap();

	let expected = job_id.clone();
	wait_until(|| runner.ran_jobs().contains(&expected)).await;

	let job = store.job(&job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Pending);
	queue.shutdown().await;
}

#[tokio::test]
async fn second_submission_is_invalid_state() {
	let store = test_store().await;
	let queue = TaskQueue::new(store.clone(), QueueConfig::test());

	let job_id = make_job(&store).await;
	queue.submit(&job_id).await.unwrap();

	let err = queue.submit(&job_id).await.unwrap_err();
	match err {
		QueueError::InvalidState { actual, .. } => assert_eq!(actual, "pending"),
		other => panic!("expected invalid state, got {other:?}"),
	}
}

#[tokio::test]
async fn submit_unknown_job_is_not_found() {
	let store = test_store().await;
	let queue = TaskQueue::new(store, QueueConfig::test());
	assert!(matches!(queue.submit("missing").await.unwrap_err(), QueueError::NotFound));
}

#[tokio::test]
async fn cancel_queued_job_dequeues_and_fails_it() {
	let store = test_store().await;
	// No workers started: the job stays queued.
	let queue = TaskQueue::new(store.clone(), QueueConfig::test());

	let job_id = make_job(&store).await;
	queue.submit(&job_id).await.unwrap();
	assert_eq!(queue.queued_count(), 1);

	let outcome = queue.cancel(&job_id).await.unwrap();
	assert_eq!(outcome, CancelOutcome::Dequeued);
	assert_eq!(queue.queued_count(), 0);

	let job = store.job(&job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Failed);
	assert_eq!(job.error_message.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn cancel_running_job_signals_its_worker() {
	let store = test_store().await;
	let queue = TaskQueue::new(store.clone(), QueueConfig::test());
	let runner = RecordingRunner::new(true);
	queue.start(runner.clone());

	let job_id = make_job(&store).await;
	queue.submit(&job_id).await.unwrap();

	let queue_probe = queue.clone();
	wait_until(move || queue_probe.inflight_count() == 1).await;

	let outcome = queue.cancel(&job_id).await.unwrap();
	assert_eq!(outcome, CancelOutcome::Signalled);

	let queue_probe = queue.clone();
	wait_until(move || queue_probe.inflight_count() == 0).await;
	queue.shutdown().await;
}

#[tokio::test]
async fn cancel_unknown_job_is_a_no_op() {
	let store = test_store().await;
	let queue = TaskQueue::new(store, QueueConfig::test());
	assert_eq!(queue.cancel("missing").await.unwrap(), CancelOutcome::NotFound);
}

#[tokio::test]
async fn scanner_recovers_stranded_pending_jobs() {
	let store = test_store().await;
	let job_id = make_job(&store).await;
	// Simulate a crash: the job reached *pending* but was never enqueued.
	store.atomic_status_transition(&job_id, JobStatus::Uploaded, JobStatus::Pending).await.unwrap();

	let queue = TaskQueue::new(store.clone(), QueueConfig::test());
	let runner = RecordingRunner::new(false);
	queue.start(runner.clone());

	let expected = job_id.clone();
	wait_until(|| runner.ran_jobs().contains(&expected)).await;
	queue.shutdown().await;
}

#[tokio::test]
async fn inflight_never_exceeds_worker_count() {
	let store = test_store().await;
	let queue = TaskQueue::new(store.clone(), QueueConfig::test());
	let runner = RecordingRunner::new(true);
	queue.start(runner.clone());

	let mut ids = Vec::new();
	for _ in 0..5 {
		let id = make_job(&store).await;
		queue.submit(&id).await.unwrap();
		ids.push(id);
	}

	let queue_probe = queue.clone();
	wait_until(move || queue_probe.inflight_count() == 2).await;
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(queue.inflight_count(), 2);
	assert_eq!(queue.queued_count(), 3);

	queue.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_workers_within_deadline() {
	let store = test_store().await;
	let queue = TaskQueue::new(store.clone(), QueueConfig::test());
	let runner = RecordingRunner::new(true);
	queue.start(runner);

	let job_id = make_job(&store).await;
	queue.submit(&job_id).await.unwrap();

	let queue_probe = queue.clone();
	wait_until(move || queue_probe.inflight_count() == 1).await;

	let start = std::time::Instant::now();
	queue.shutdown().await;
	assert!(start.elapsed() < Duration::from_secs(5));
}
