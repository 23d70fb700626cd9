use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use crate::event::{EventKind, JobEvent};

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;

struct Sub {
	id: u64,
	tx: mpsc::Sender<JobEvent>,
}

struct State {
	topics: HashMap<String, Vec<Sub>>,
	next_id: u64,
	shutdown: bool,
}

/// Per-job topic fan-out. Each subscriber owns a bounded channel; a full
/// channel drops events for that subscriber only, so slow consumers never
/// block publishers.
#[derive(Clone)]
pub struct Broadcaster {
	inner: Arc<Mutex<State>>,
	capacity: usize,
}

impl Default for Broadcaster {
	fn default() -> Self {
		Self::new()
	}
}

impl Broadcaster {
	#[must_use]
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_SUBSCRIBER_BUFFER)
	}

	#[must_use]
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			inner: Arc::new(Mutex::new(State {
				topics: HashMap::new(),
				next_id: 0,
				shutdown: false,
			})),
			capacity: capacity.max(1),
		}
	}

	/// Register a subscriber on a job's topic. The channel immediately
	/// carries a synthetic *connected* event. Duplicate subscriptions from
	/// the same client are independent.
	#[must_use]
	pub fn subscribe(&self, job_id: &str) -> Subscription {
		let (tx, rx) = mpsc::channel(self.capacity);
		let mut state = self.inner.lock().expect("broadcaster lock poisoned");

		let id = state.next_id;
		state.next_id += 1;

		if !state.shutdown {
			let connected = JobEvent::new(job_id, EventKind::Connected, serde_json::json!({ "job_id": job_id }));
			let _ = tx.try_send(connected);
			state.topics.entry(job_id.to_string()).or_default().push(Sub { id, tx });
		}
		// After shutdown the tx is dropped here, handing back a closed channel.

		Subscription {
			job_id: job_id.to_string(),
			id,
			rx,
			inner: Arc::downgrade(&self.inner),
		}
	}

	/// Best-effort delivery to every subscriber of the topic, in publish
	/// order per subscriber. Returns the number of deliveries.
	pub fn publish(&self, job_id: &str, kind: EventKind, payload: serde_json::Value) -> usize {
		let event = JobEvent::new(job_id, kind, payload);
		let mut state = self.inner.lock().expect("broadcaster lock poisoned");
		if state.shutdown {
			return 0;
		}

		let Some(subs) = state.topics.get_mut(job_id) else {
			return 0;
		};

		let mut delivered = 0;
		subs.retain(|sub| match sub.tx.try_send(event.clone()) {
			Ok(()) => {
				delivered += 1;
				true
			}
			Err(mpsc::error::TrySendError::Full(_)) => {
				debug!(job_id, subscriber = sub.id, "dropping event for slow subscriber");
				true
			}
			Err(mpsc::error::TrySendError::Closed(_)) => false,
		});

		if subs.is_empty() {
			state.topics.remove(job_id);
		}
		delivered
	}

	/// Remove one subscriber. Closes its channel exactly once; a second
	/// call for the same id, or a call after shutdown, is a no-op.
	pub fn unsubscribe(&self, job_id: &str, subscriber_id: u64) {
		Self::remove_subscriber(&self.inner, job_id, subscriber_id);
	}

	fn remove_subscriber(inner: &Mutex<State>, job_id: &str, subscriber_id: u64) {
		let Ok(mut state) = inner.lock() else { return };
		if let Some(subs) = state.topics.get_mut(job_id) {
			subs.retain(|sub| sub.id != subscriber_id);
			if subs.is_empty() {
				state.topics.remove(job_id);
			}
		}
	}

	/// Close every subscriber channel. Publish and unsubscribe stay safe
	/// no-ops afterwards.
	pub fn shutdown(&self) {
		let mut state = self.inner.lock().expect("broadcaster lock poisoned");
		state.shutdown = true;
		state.topics.clear();
	}

	#[must_use]
	pub fn subscriber_count(&self, job_id: &str) -> usize {
		let state = self.inner.lock().expect("broadcaster lock poisoned");
		state.topics.get(job_id).map_or(0, Vec::len)
	}
}

/// A live subscription. Dropping it removes the subscriber from the topic,
/// so an abandoned SSE connection leaks nothing.
pub struct Subscription {
	job_id: String,
	id: u64,
	rx: mpsc::Receiver<JobEvent>,
	inner: Weak<Mutex<State>>,
}

impl Subscription {
	#[must_use]
	pub fn job_id(&self) -> &str {
		&self.job_id
	}

	/// Next event, in publish order. `None` once the broadcaster has shut
	/// down or this subscriber was unsubscribed.
	pub async fn recv(&mut self) -> Option<JobEvent> {
		self.rx.recv().await
	}

	pub fn try_recv(&mut self) -> Option<JobEvent> {
		self.rx.try_recv().ok()
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(inner) = self.inner.upgrade() {
			Broadcaster::remove_subscriber(&inner, &self.job_id, self.id);
		}
	}
}
