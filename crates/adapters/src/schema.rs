use regex::Regex;
use serde_json::Value;

use crate::error::{AdapterError, Result};

#[derive(Debug, Clone)]
pub enum ParameterKind {
	Text { max_length: Option<usize>, pattern: Option<String> },
	Integer { min: Option<i64>, max: Option<i64> },
	Float { min: Option<f64>, max: Option<f64> },
	Boolean,
	Choice { options: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct ParameterField {
	pub name: String,
	pub kind: ParameterKind,
	pub required: bool,
	/// A field the client must supply together with this one
	/// (min_speakers / max_speakers travel as a pair).
	pub requires_peer: Option<String>,
}

impl ParameterField {
	#[must_use]
	pub fn text(name: &str) -> Self {
		Self {
			name: name.to_string(),
			kind: ParameterKind::Text { max_length: None, pattern: None },
			required: false,
			requires_peer: None,
		}
	}

	#[must_use]
	pub fn integer(name: &str, min: Option<i64>, max: Option<i64>) -> Self {
		Self {
			name: name.to_string(),
			kind: ParameterKind::Integer { min, max },
			required: false,
			requires_peer: None,
		}
	}

	#[must_use]
	pub fn float(name: &str, min: Option<f64>, max: Option<f64>) -> Self {
		Self {
			name: name.to_string(),
			kind: ParameterKind::Float { min, max },
			required: false,
			requires_peer: None,
		}
	}

	#[must_use]
	pub fn boolean(name: &str) -> Self {
		Self {
			name: name.to_string(),
			kind: ParameterKind::Boolean,
			required: false,
			requires_peer: None,
		}
	}

	#[must_use]
	pub fn choice(name: &str, options: &[&str]) -> Self {
		Self {
			name: name.to_string(),
			kind: ParameterKind::Choice {
				options: options.iter().map(ToString::to_string).collect(),
			},
			required: false,
			requires_peer: None,
		}
	}

	#[must_use]
	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	#[must_use]
	pub fn requires(mut self, peer: &str) -> Self {
		self.requires_peer = Some(peer.to_string());
		self
	}

	#[must_use]
	pub fn max_length(mut self, limit: usize) -> Self {
		if let ParameterKind::Text { max_length, .. } = &mut self.kind {
			*max_length = Some(limit);
		}
		self
	}

	#[must_use]
	pub fn pattern(mut self, regex: &str) -> Self {
		if let ParameterKind::Text { pattern, .. } = &mut self.kind {
			*pattern = Some(regex.to_string());
		}
		self
	}
}

/// An adapter's declared parameter surface. Validation rejects unknown
/// names, type mismatches, missing requireds, range/option/pattern
/// violations, and broken field pairs, all before any process launches.
#[derive(Debug, Clone, Default)]
pub struct ParameterSchema {
	pub fields: Vec<ParameterField>,
}

impl ParameterSchema {
	#[must_use]
	pub fn new(fields: Vec<ParameterField>) -> Self {
		Self { fields }
	}

	fn field(&self, name: &str) -> Option<&ParameterField> {
		self.fields.iter().find(|f| f.name == name)
	}

	pub fn validate(&self, params: &Value) -> Result<()> {
		let empty = serde_json::Map::new();
		let object = match params {
			Value::Null => &empty,
			Value::Object(map) => map,
			other => {
				return Err(AdapterError::InvalidParameters(format!("parameters must be an object, got {other}")));
			}
		};

		let mut errors = Vec::new();

		for (name, value) in object {
			match self.field(name) {
				None => errors.push(format!("unknown parameter `{name}`")),
				Some(field) => {
					if value.is_null() {
						continue;
					}
					if let Err(message) = validate_value(field, value) {
						errors.push(message);
					}
					if let Some(peer) = &field.requires_peer {
						if object.get(peer).map_or(true, Value::is_null) {
							errors.push(format!("`{name}` requires `{peer}` to be set as well"));
						}
					}
				}
			}
		}

		for field in &self.fields {
			if field.required && object.get(&field.name).map_or(true, Value::is_null) {
				errors.push(format!("missing required parameter `{}`", field.name));
			}
		}

		if errors.is_empty() {
			Ok(())
		} else {
			Err(AdapterError::InvalidParameters(errors.join("; ")))
		}
	}
}

fn validate_value(field: &ParameterField, value: &Value) -> std::result::Result<(), String> {
	let name = &field.name;
	match &field.kind {
		ParameterKind::Text { max_length, pattern } => {
			let Some(text) = value.as_str() else {
				return Err(format!("`{name}` must be a string"));
			};
			if let Some(limit) = max_length {
				if text.len() > *limit {
					return Err(format!("`{name}` exceeds maximum length {limit}"));
				}
			}
			if let Some(pattern) = pattern {
				let regex = Regex::new(pattern).map_err(|e| format!("`{name}` has an invalid pattern rule: {e}"))?;
				if !regex.is_match(text) {
					return Err(format!("`{name}` does not match `{pattern}`"));
				}
			}
			Ok(())
		}
		ParameterKind::Integer { min, max } => {
			let Some(number) = value.as_i64() else {
				return Err(format!("`{name}` must be an integer"));
			};
			if let Some(min) = min {
				if number < *min {
					return Err(format!("`{name}` must be at least {min}"));
				}
			}
			if let Some(max) = max {
				if number > *max {
					return Err(format!("`{name}` must be at most {max}"));
				}
			}
			Ok(())
		}
		ParameterKind::Float { min, max } => {
			let Some(number) = value.as_f64() else {
				return Err(format!("`{name}` must be a number"));
			};
			if let Some(min) = min {
				if number < *min {
					return Err(format!("`{name}` must be at least {min}"));
				}
			}
			if let Some(max) = max {
				if number > *max {
					return Err(format!("`{name}` must be at most {max}"));
				}
			}
			Ok(())
		}
		ParameterKind::Boolean => {
			if value.is_boolean() {
				Ok(())
			} else {
				Err(format!("`{name}` must be a boolean"))
			}
		}
		ParameterKind::Choice { options } => {
			let Some(text) = value.as_str() else {
				return Err(format!("`{name}` must be a string"));
			};
			if options.iter().any(|o| o == text) {
				Ok(())
			} else {
				Err(format!("`{name}` must be one of [{}]", options.join(", ")))
			}
		}
	}
}

/// Deterministic argv fragment from a schema and a parameter object:
/// fields are visited in declaration order, `true` booleans become bare
/// flags, everything else becomes `--name value`.
#[must_use]
pub fn args_from_parameters(schema: &ParameterSchema, params: &Value) -> Vec<String> {
	let Some(object) = params.as_object() else {
		return Vec::new();
	};

	let mut args = Vec::new();
	for field in &schema.fields {
		let Some(value) = object.get(&field.name) else { continue };
		if value.is_null() {
			continue;
		}
		match &field.kind {
			ParameterKind::Boolean => {
				if value.as_bool() == Some(true) {
					args.push(format!("--{}", field.name));
				}
			}
			_ => {
				let rendered = match value {
					Value::String(s) => s.clone(),
					other => other.to_string(),
				};
				args.push(format!("--{}", field.name));
				args.push(rendered);
			}
		}
	}
	args
}
