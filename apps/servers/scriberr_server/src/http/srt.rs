use std::collections::HashMap;

use adapters::TranscriptResult;

/// `HH:MM:SS,mmm` as SubRip wants it.
fn format_timestamp(seconds: f64) -> String {
	let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
	let ms = total_ms % 1000;
	let total_secs = total_ms / 1000;
	let secs = total_secs % 60;
	let mins = (total_secs / 60) % 60;
	let hours = total_secs / 3600;
	format!("{hours:02}:{mins:02}:{secs:02},{ms:03}")
}

/// Render the normalized transcript as SubRip, applying any user-assigned
/// speaker labels.
pub fn render_srt(result: &TranscriptResult, labels: &HashMap<String, String>) -> String {
	let mut output = String::new();
	for (index, segment) in result.segments.iter().enumerate() {
		output.push_str(&format!("{}\n", index + 1));
		output.push_str(&format!("{} --> {}\n", format_timestamp(segment.start), format_timestamp(segment.end)));
		if let Some(speaker) = &segment.speaker {
			let label = labels.get(speaker).unwrap_or(speaker);
			output.push_str(&format!("{label}: {}\n", segment.text));
		} else {
			output.push_str(&segment.text);
			output.push('\n');
		}
		output.push('\n');
	}
	output
}

#[cfg(test)]
mod tests {
	use super::*;
	use adapters::Segment;

	fn result() -> TranscriptResult {
		TranscriptResult {
			text: "hello world".to_string(),
			language: Some("en".to_string()),
			segments: vec![
				Segment {
					start: 0.0,
					end: 1.5,
					text: "hello".to_string(),
					speaker: Some("SPEAKER_00".to_string()),
					language: None,
				},
				Segment {
					start: 61.25,
					end: 3662.5,
					text: "world".to_string(),
					speaker: None,
					language: None,
				},
			],
			words: None,
			confidence: None,
			processing_seconds: 0.1,
			model_id: "test".to_string(),
			metadata: serde_json::Value::Null,
		}
	}

	#[test]
	fn timestamps_cover_hours_and_millis() {
		assert_eq!(format_timestamp(0.0), "00:00:00,000");
		assert_eq!(format_timestamp(1.5), "00:00:01,500");
		assert_eq!(format_timestamp(61.25), "00:01:01,250");
		assert_eq!(format_timestamp(3662.5), "01:01:02,500");
	}

	#[test]
	fn srt_applies_speaker_labels() {
		let labels = HashMap::from([("SPEAKER_00".to_string(), "Alice".to_string())]);
		let srt = render_srt(&result(), &labels);
		assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,500\nAlice: hello\n\n"));
		assert!(srt.contains("2\n00:01:01,250 --> 01:01:02,500\nworld\n"));
	}

	#[test]
	fn unmapped_speakers_keep_their_original_label() {
		let srt = render_srt(&result(), &HashMap::new());
		assert!(srt.contains("SPEAKER_00: hello"));
	}
}
