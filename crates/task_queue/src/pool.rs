use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use job_store::{JobStatus, JobStore, StoreError, UpdateJob};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::{CancelOutcome, JobRunner};

struct QueueState {
	/// Ids admitted but not yet claimed. Membership here is authoritative:
	/// an id popped off the channel that is no longer in this set was
	/// cancelled while queued.
	queued: HashSet<String>,
	/// One cancellation token per job a worker currently holds.
	inflight: HashMap<String, CancellationToken>,
}

struct QueueInner {
	store: JobStore,
	tx: mpsc::UnboundedSender<String>,
	rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
	state: Mutex<QueueState>,
	root: CancellationToken,
	config: QueueConfig,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Process-wide FIFO of pending job ids dispatched to a fixed worker pool.
/// Submission never blocks; concurrency is bounded by the worker count,
/// each worker holding at most one job.
#[derive(Clone)]
pub struct TaskQueue {
	inner: Arc<QueueInner>,
}

impl TaskQueue {
	#[must_use]
	pub fn new(store: JobStore, config: QueueConfig) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Self {
			inner: Arc::new(QueueInner {
				store,
				tx,
				rx: tokio::sync::Mutex::new(rx),
				state: Mutex::new(QueueState {
					queued: HashSet::new(),
					inflight: HashMap::new(),
				}),
				root: CancellationToken::new(),
				config,
				handles: Mutex::new(Vec::new()),
			}),
		}
	}

	/// Admit an uploaded job: atomically flip *uploaded* → *pending*, then
	/// enqueue. A job in any other state is rejected.
	pub async fn submit(&self, job_id: &str) -> Result<()> {
		match self.inner.store.atomic_status_transition(job_id, JobStatus::Uploaded, JobStatus::Pending).await {
			Ok(()) => {}
			Err(StoreError::Stale { actual, .. }) => {
				return Err(QueueError::InvalidState {
					job_id: job_id.to_string(),
					actual,
				});
			}
			Err(StoreError::NotFound) => return Err(QueueError::NotFound),
			Err(e) => return Err(QueueError::Store(e)),
		}

		self.enqueue(job_id);
		Ok(())
	}

	/// Enqueue unless already queued or held by a worker. Used by both
	/// submission and the scanner; returns whether the id was admitted.
	fn enqueue(&self, job_id: &str) -> bool {
		let mut state = self.inner.state.lock().expect("queue state lock poisoned");
		if state.queued.contains(job_id) || state.inflight.contains_key(job_id) {
			return false;
		}
		state.queued.insert(job_id.to_string());
		if self.inner.tx.send(job_id.to_string()).is_err() {
			state.queued.remove(job_id);
			return false;
		}
		debug!(job_id, "enqueued");
		true
	}

	/// Cancel wherever the job currently is: signal its worker, or pull it
	/// off the queue and fail it, or report it unknown (a no-op).
	pub async fn cancel(&self, job_id: &str) -> Result<CancelOutcome> {
		enum Action {
			Signal(CancellationToken),
			Dequeue,
			Missing,
		}

		let action = {
			let mut state = self.inner.state.lock().expect("queue state lock poisoned");
			if let Some(token) = state.inflight.get(job_id) {
				Action::Signal(token.clone())
			} else if state.queued.remove(job_id) {
				Action::Dequeue
			} else {
				Action::Missing
			}
		};

		match action {
			Action::Signal(token) => {
				info!(job_id, "cancellation signalled to worker");
				token.cancel();
				Ok(CancelOutcome::Signalled)
			}
			Action::Dequeue => {
				self.inner.store.atomic_status_transition(job_id, JobStatus::Pending, JobStatus::Failed).await?;
				self.inner
					.store
					.update_job(
						job_id,
						UpdateJob {
							error_message: Some("cancelled".to_string()),
							completed_at: Some(Utc::now()),
							..UpdateJob::default()
						},
					)
					.await?;
				info!(job_id, "cancelled while queued");
				Ok(CancelOutcome::Dequeued)
			}
			Action::Missing => Ok(CancelOutcome::NotFound),
		}
	}

	/// Spawn the worker pool and the periodic reconciliation scanner.
	pub fn start(&self, runner: Arc<dyn JobRunner>) {
		let worker_count = self.inner.config.resolved_worker_count();
		info!(worker_count, "starting worker pool");

		let mut handles = self.inner.handles.lock().expect("queue handles lock poisoned");
		for worker_id in 0..worker_count {
			let queue = self.clone();
			let runner = Arc::clone(&runner);
			handles.push(tokio::spawn(async move {
				queue.worker_loop(worker_id, runner).await;
			}));
		}

		let queue = self.clone();
		handles.push(tokio::spawn(async move {
			queue.scanner_loop().await;
		}));
	}

	async fn worker_loop(&self, worker_id: usize, runner: Arc<dyn JobRunner>) {
		loop {
			let claimed = {
				let mut rx = self.inner.rx.lock().await;
				tokio::select! {
					() = self.inner.root.cancelled() => None,
					job_id = rx.recv() => job_id,
				}
			};

			let Some(job_id) = claimed else {
				debug!(worker_id, "worker stopping");
				return;
			};

			let token = {
				let mut state = self.inner.state.lock().expect("queue state lock poisoned");
				if !state.queued.remove(&job_id) {
					// Cancelled between enqueue and claim.
					continue;
				}
				let token = self.inner.root.child_token();
				state.inflight.insert(job_id.clone(), token.clone());
				token
			};

			debug!(worker_id, job_id = %job_id, "claimed job");
			runner.run_job(&job_id, token).await;

			let mut state = self.inner.state.lock().expect("queue state lock poisoned");
			state.inflight.remove(&job_id);
		}
	}

	/// Reconciler: re-enqueue *pending* jobs that are neither queued nor
	/// in flight, e.g. after a crash left them stranded.
	async fn scanner_loop(&self) {
		let mut interval = tokio::time::interval(self.inner.config.scan_interval);
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				() = self.inner.root.cancelled() => return,
				_ = interval.tick() => {}
			}

			match self.inner.store.find_pending_for_scanner(self.inner.config.scan_limit).await {
				Ok(ids) => {
					for id in ids {
						if self.enqueue(&id) {
							warn!(job_id = %id, "scanner re-enqueued stranded pending job");
						}
					}
				}
				Err(e) => error!(error = %e, "scanner query failed"),
			}
		}
	}

	#[must_use]
	pub fn queued_count(&self) -> usize {
		self.inner.state.lock().expect("queue state lock poisoned").queued.len()
	}

	#[must_use]
	pub fn inflight_count(&self) -> usize {
		self.inner.state.lock().expect("queue state lock poisoned").inflight.len()
	}

	#[must_use]
	pub fn worker_count(&self) -> usize {
		self.inner.config.resolved_worker_count()
	}

	/// Stop claiming, cancel all workers, and wait for them under the
	/// configured deadline.
	pub async fn shutdown(&self) {
		info!("queue shutting down");
		self.inner.root.cancel();

		let handles: Vec<JoinHandle<()>> = {
			let mut guard = self.inner.handles.lock().expect("queue handles lock poisoned");
			guard.drain(..).collect()
		};

		let deadline = Instant::now() + self.inner.config.shutdown_grace;
		for handle in handles {
			let remaining = deadline.saturating_duration_since(Instant::now());
			if tokio::time::timeout(remaining, handle).await.is_err() {
				warn!("worker did not acknowledge shutdown before the deadline");
			}
		}
	}
}
