mod requirements;
mod selection;

pub use requirements::ModelRequirements;
pub use selection::score_candidate;

use std::collections::HashMap;
use std::sync::Arc;

use adapters::{AdapterKind, ModelAdapter};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RegistryError {
	#[error("no suitable model: {0}")]
	NoSuitableModel(String),
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

/// Process-wide catalog of adapters. Registrations happen at startup; the
/// registry is read-mostly afterwards and shared behind an `Arc` without
/// further locking.
#[derive(Default)]
pub struct ModelRegistry {
	transcription: HashMap<String, Arc<dyn ModelAdapter>>,
	diarization: HashMap<String, Arc<dyn ModelAdapter>>,
	composite: HashMap<String, Arc<dyn ModelAdapter>>,
	/// Registration order; breaks score ties deterministically.
	order: Vec<String>,
}

impl ModelRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, adapter: Arc<dyn ModelAdapter>) {
		let id = adapter.id().to_string();
		match adapter.kind() {
			AdapterKind::Transcription => {
				self.transcription.insert(id.clone(), adapter);
			}
			AdapterKind::Diarization => {
				self.diarization.insert(id.clone(), adapter);
			}
			AdapterKind::Composite => {
				self.composite.insert(id.clone(), adapter);
			}
		}
		if !self.order.contains(&id) {
			self.order.push(id);
		}
	}

	#[must_use]
	pub fn get(&self, id: &str) -> Option<Arc<dyn ModelAdapter>> {
		self.transcription
			.get(id)
			.or_else(|| self.composite.get(id))
			.or_else(|| self.diarization.get(id))
			.cloned()
	}

	/// Every registered adapter in registration order.
	#[must_use]
	pub fn all(&self) -> Vec<Arc<dyn ModelAdapter>> {
		self.order.iter().filter_map(|id| self.get(id)).collect()
	}

	fn candidates(&self, requirements: &ModelRequirements) -> Vec<Arc<dyn ModelAdapter>> {
		let pool: &HashMap<String, Arc<dyn ModelAdapter>> = if requirements.needs_diarization() { &self.diarization } else { &self.transcription };

		self.order
			.iter()
			.filter_map(|id| pool.get(id).or_else(|| self.composite.get(id)))
			.cloned()
			.collect()
	}

	/// Pick the best adapter for a requirement set. An explicitly named
	/// model bypasses scoring; otherwise candidates are scored per the
	/// capability table and the highest positive score wins, first
	/// registration taking ties.
	pub fn select(&self, requirements: &ModelRequirements) -> Result<Arc<dyn ModelAdapter>> {
		if let Some(model) = &requirements.model {
			return self
				.get(model)
				.ok_or_else(|| RegistryError::NoSuitableModel(format!("requested model `{model}` is not registered")));
		}

		let mut best: Option<(i64, Arc<dyn ModelAdapter>)> = None;
		for candidate in self.candidates(requirements) {
			let Some(score) = score_candidate(requirements, candidate.capabilities()) else {
				continue;
			};
			debug!(adapter = candidate.id(), score, "scored candidate");
			if score <= 0 {
				continue;
			}
			match &best {
				Some((top, _)) if *top >= score => {}
				_ => best = Some((score, candidate)),
			}
		}

		best.map(|(_, adapter)| adapter)
			.ok_or_else(|| RegistryError::NoSuitableModel(requirements.describe()))
	}
}
