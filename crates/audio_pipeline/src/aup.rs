use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{PipelineError, Result};

/// One `<wavetrack>` of an Audacity-style project file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTrack {
	pub name: String,
	pub mute: bool,
	pub solo: bool,
	pub gain: f64,
	pub pan: f64,
	pub clips: Vec<ProjectClip>,
}

/// A `<waveclip>` with its `<import>`ed file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectClip {
	pub offset: f64,
	pub filename: String,
	pub channel: i64,
}

/// A track entry flattened to one row per imported file, carrying the
/// enclosing wavetrack's mix settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedTrack {
	pub track_index: i64,
	pub filename: String,
	pub offset_seconds: f64,
	pub channel: i64,
	pub gain: f64,
	pub pan: f64,
	pub mute: bool,
}

fn attr_error(e: impl std::fmt::Display) -> PipelineError {
	PipelineError::ProjectParse(format!("bad attribute: {e}"))
}

fn write_error(e: impl std::fmt::Display) -> PipelineError {
	PipelineError::ProjectParse(format!("serialize failed: {e}"))
}

fn parse_flag(value: &str) -> bool {
	value == "1" || value.eq_ignore_ascii_case("true")
}

pub fn parse_project(xml: &str) -> Result<Vec<ProjectTrack>> {
	let mut reader = Reader::from_str(xml);
	let mut tracks: Vec<ProjectTrack> = Vec::new();
	let mut current: Option<ProjectTrack> = None;
	let mut clip_offset = 0.0_f64;

	loop {
		let event = reader.read_event().map_err(|e| PipelineError::ProjectParse(e.to_string()))?;
		match event {
			Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
				b"wavetrack" => {
					if let Some(track) = current.take() {
						tracks.push(track);
					}
					let mut track = ProjectTrack {
						name: String::new(),
						mute: false,
						solo: false,
						gain: 1.0,
						pan: 0.0,
						clips: Vec::new(),
					};
					for attr in e.attributes() {
						let attr = attr.map_err(attr_error)?;
						let value = attr.unescape_value().map_err(attr_error)?;
						match attr.key.as_ref() {
							b"name" => track.name = value.into_owned(),
							b"mute" => track.mute = parse_flag(&value),
							b"solo" => track.solo = parse_flag(&value),
							b"gain" => track.gain = value.parse().map_err(attr_error)?,
							b"pan" => track.pan = value.parse().map_err(attr_error)?,
							_ => {}
						}
					}
					current = Some(track);
				}
				b"waveclip" => {
					clip_offset = 0.0;
					for attr in e.attributes() {
						let attr = attr.map_err(attr_error)?;
						if attr.key.as_ref() == b"offset" {
							let value = attr.unescape_value().map_err(attr_error)?;
							clip_offset = value.parse().map_err(attr_error)?;
						}
					}
				}
				b"import" => {
					let track = current
						.as_mut()
						.ok_or_else(|| PipelineError::ProjectParse("<import> outside of a wavetrack".to_string()))?;
					let mut filename = String::new();
					let mut channel = 0_i64;
					for attr in e.attributes() {
						let attr = attr.map_err(attr_error)?;
						let value = attr.unescape_value().map_err(attr_error)?;
						match attr.key.as_ref() {
							b"filename" => filename = value.into_owned(),
							b"channel" => channel = value.parse().map_err(attr_error)?,
							_ => {}
						}
					}
					if filename.is_empty() {
						return Err(PipelineError::ProjectParse("<import> without a filename".to_string()));
					}
					track.clips.push(ProjectClip {
						offset: clip_offset,
						filename,
						channel,
					});
				}
				_ => {}
			},
			Event::End(ref e) if e.name().as_ref() == b"wavetrack" => {
				if let Some(track) = current.take() {
					tracks.push(track);
				}
			}
			Event::Eof => break,
			_ => {}
		}
	}

	if let Some(track) = current.take() {
		tracks.push(track);
	}
	Ok(tracks)
}

/// Canonical serialization of a parsed project; parsing it back yields the
/// same per-track offsets, gains, and pans.
pub fn serialize_project(tracks: &[ProjectTrack]) -> Result<String> {
	let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

	writer
		.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
		.map_err(write_error)?;
	writer.write_event(Event::Start(BytesStart::new("project"))).map_err(write_error)?;

	for track in tracks {
		let mut element = BytesStart::new("wavetrack");
		element.push_attribute(("name", track.name.as_str()));
		element.push_attribute(("mute", if track.mute { "1" } else { "0" }));
		element.push_attribute(("solo", if track.solo { "1" } else { "0" }));
		element.push_attribute(("gain", track.gain.to_string().as_str()));
		element.push_attribute(("pan", track.pan.to_string().as_str()));
		writer.write_event(Event::Start(element)).map_err(write_error)?;

		for clip in &track.clips {
			let mut clip_element = BytesStart::new("waveclip");
			clip_element.push_attribute(("offset", clip.offset.to_string().as_str()));
			writer.write_event(Event::Start(clip_element)).map_err(write_error)?;

			let mut import = BytesStart::new("import");
			import.push_attribute(("filename", clip.filename.as_str()));
			import.push_attribute(("channel", clip.channel.to_string().as_str()));
			writer.write_event(Event::Empty(import)).map_err(write_error)?;

			writer.write_event(Event::End(BytesEnd::new("waveclip"))).map_err(write_error)?;
		}

		writer.write_event(Event::End(BytesEnd::new("wavetrack"))).map_err(write_error)?;
	}

	writer.write_event(Event::End(BytesEnd::new("project"))).map_err(write_error)?;

	String::from_utf8(writer.into_inner()).map_err(|e| PipelineError::ProjectParse(format!("serialized project is not utf-8: {e}")))
}

#[must_use]
pub fn flatten_tracks(tracks: &[ProjectTrack]) -> Vec<FlattenedTrack> {
	let mut flattened = Vec::new();
	let mut index = 0_i64;
	for track in tracks {
		for clip in &track.clips {
			flattened.push(FlattenedTrack {
				track_index: index,
				filename: clip.filename.clone(),
				offset_seconds: clip.offset,
				channel: clip.channel,
				gain: track.gain,
				pan: track.pan,
				mute: track.mute,
			});
			index += 1;
		}
	}
	flattened
}

#[cfg(test)]
mod tests {
	use super::*;

	const PROJECT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
  <wavetrack name="Host" mute="0" solo="0" gain="1" pan="0">
    <waveclip offset="0.0">
      <import filename="host.wav" channel="0"/>
    </waveclip>
  </wavetrack>
  <wavetrack name="Guest" mute="1" solo="0" gain="0.75" pan="-0.4">
    <waveclip offset="2.5">
      <import filename="guest.wav" channel="1"/>
    </waveclip>
  </wavetrack>
</project>"#;

	#[test]
	fn parses_tracks_clips_and_mix_settings() {
		let tracks = parse_project(PROJECT).unwrap();
		assert_eq!(tracks.len(), 2);
		assert_eq!(tracks[0].name, "Host");
		assert!(!tracks[0].mute);
		assert_eq!(tracks[0].clips[0].filename, "host.wav");
		assert!(tracks[1].mute);
		assert!((tracks[1].gain - 0.75).abs() < f64::EPSILON);
		assert!((tracks[1].pan + 0.4).abs() < f64::EPSILON);
		assert!((tracks[1].clips[0].offset - 2.5).abs() < f64::EPSILON);
		assert_eq!(tracks[1].clips[0].channel, 1);
	}

	#[test]
	fn parse_serialize_parse_round_trips() {
		let parsed = parse_project(PROJECT).unwrap();
		let serialized = serialize_project(&parsed).unwrap();
		let reparsed = parse_project(&serialized).unwrap();
		assert_eq!(parsed, reparsed);
	}

	#[test]
	fn flattening_carries_track_settings() {
		let tracks = parse_project(PROJECT).unwrap();
		let flattened = flatten_tracks(&tracks);
		assert_eq!(flattened.len(), 2);
		assert_eq!(flattened[0].track_index, 0);
		assert_eq!(flattened[1].filename, "guest.wav");
		assert!(flattened[1].mute);
		assert!((flattened[1].offset_seconds - 2.5).abs() < f64::EPSILON);
	}

	#[test]
	fn import_outside_track_is_rejected() {
		let err = parse_project(r#"<project><import filename="x.wav"/></project>"#).unwrap_err();
		assert!(err.to_string().contains("outside of a wavetrack"));
	}

	#[test]
	fn import_without_filename_is_rejected() {
		let xml = r#"<project><wavetrack name="a"><waveclip offset="0"><import channel="0"/></waveclip></wavetrack></project>"#;
		assert!(parse_project(xml).is_err());
	}
}
