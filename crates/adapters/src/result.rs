use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AdapterError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
	pub start: f64,
	pub end: f64,
	pub text: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub speaker: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
	pub start: f64,
	pub end: f64,
	pub word: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub score: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub speaker: Option<String>,
}

/// Canonical transcript shape every adapter's sidecar is mapped into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
	pub text: String,
	#[serde(default)]
	pub language: Option<String>,
	pub segments: Vec<Segment>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub words: Option<Vec<Word>>,
	#[serde(default)]
	pub confidence: Option<f64>,
	pub processing_seconds: f64,
	pub model_id: String,
	#[serde(default)]
	pub metadata: Value,
}

impl TranscriptResult {
	/// Distinct speaker labels across segments, in label order.
	#[must_use]
	pub fn speakers(&self) -> BTreeSet<String> {
		self.segments.iter().filter_map(|s| s.speaker.clone()).collect()
	}

	#[must_use]
	pub fn has_diarization(&self) -> bool {
		self.segments.iter().any(|s| s.speaker.is_some())
	}

	pub fn to_value(&self) -> Result<Value> {
		Ok(serde_json::to_value(self)?)
	}

	pub fn from_value(value: &Value) -> Result<Self> {
		Ok(serde_json::from_value(value.clone())?)
	}
}

#[derive(Debug, Deserialize)]
struct RawWord {
	start: f64,
	end: f64,
	word: String,
	#[serde(default)]
	score: Option<f64>,
	#[serde(default)]
	speaker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
	start: f64,
	end: f64,
	#[serde(default)]
	text: String,
	#[serde(default)]
	speaker: Option<String>,
	#[serde(default)]
	language: Option<String>,
	#[serde(default)]
	words: Vec<RawWord>,
}

#[derive(Debug, Deserialize)]
struct RawSidecar {
	#[serde(default)]
	text: Option<String>,
	#[serde(default)]
	language: Option<String>,
	#[serde(default)]
	segments: Vec<RawSegment>,
	#[serde(default)]
	word_segments: Vec<RawWord>,
	#[serde(default)]
	confidence: Option<f64>,
	#[serde(default)]
	metadata: Option<Value>,
}

/// Map an adapter's sidecar JSON into [`TranscriptResult`]. Transcription
/// engines emit segment text; diarization-only engines emit speaker turns
/// with no text, and both shapes normalize through here.
pub fn normalize_sidecar(raw: &Value, model_id: &str, processing_seconds: f64) -> Result<TranscriptResult> {
	let sidecar: RawSidecar = serde_json::from_value(raw.clone()).map_err(|e| AdapterError::ResultParse(format!("sidecar did not match expected shape: {e}")))?;

	let mut words: Vec<Word> = Vec::new();
	let mut segments: Vec<Segment> = Vec::with_capacity(sidecar.segments.len());

	for segment in sidecar.segments {
		for word in &segment.words {
			words.push(Word {
				start: word.start,
				end: word.end,
				word: word.word.clone(),
				score: word.score,
				speaker: word.speaker.clone().or_else(|| segment.speaker.clone()),
			});
		}
		segments.push(Segment {
			start: segment.start,
			end: segment.end,
			text: segment.text.trim().to_string(),
			speaker: segment.speaker,
			language: segment.language,
		});
	}

	for word in sidecar.word_segments {
		words.push(Word {
			start: word.start,
			end: word.end,
			word: word.word,
			score: word.score,
			speaker: word.speaker,
		});
	}

	segments.sort_by(|a, b| a.start.total_cmp(&b.start));
	words.sort_by(|a, b| a.start.total_cmp(&b.start));

	let text = match sidecar.text {
		Some(text) if !text.trim().is_empty() => text.trim().to_string(),
		_ => segments.iter().map(|s| s.text.as_str()).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" "),
	};

	Ok(TranscriptResult {
		text,
		language: sidecar.language,
		segments,
		words: if words.is_empty() { None } else { Some(words) },
		confidence: sidecar.confidence,
		processing_seconds,
		model_id: model_id.to_string(),
		metadata: sidecar.metadata.unwrap_or(Value::Null),
	})
}
