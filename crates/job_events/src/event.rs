use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
	Connected,
	StatusChange,
	Progress,
	Log,
	Completed,
	Failed,
	Keepalive,
}

/// Transient progress event scoped to one job's topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
	pub job_id: String,
	#[serde(rename = "type")]
	pub kind: EventKind,
	pub payload: serde_json::Value,
}

impl JobEvent {
	#[must_use]
	pub fn new(job_id: impl Into<String>, kind: EventKind, payload: serde_json::Value) -> Self {
		Self {
			job_id: job_id.into(),
			kind,
			payload,
		}
	}

	/// The SSE wire shape: `{"type": ..., "payload": ...}`.
	#[must_use]
	pub fn wire_json(&self) -> serde_json::Value {
		serde_json::json!({ "type": self.kind, "payload": self.payload })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_shape() {
		let event = JobEvent::new("job-1", EventKind::StatusChange, serde_json::json!({"to": "processing"}));
		let wire = event.wire_json();
		assert_eq!(wire["type"], "status_change");
		assert_eq!(wire["payload"]["to"], "processing");
	}
}
