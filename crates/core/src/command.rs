//! Correction commands
//!
//! A correction overrides the authoritative position and/or run state.
//! Payloads arrive as loosely-typed JSON, so validation is done by hand
//! against [`serde_json::Value`] instead of relying on derive rejections:
//! every malformed field must surface as [`Error::InvalidCommand`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Legacy spelling of `position` used by first-generation browser clients
const LEGACY_POSITION_FIELD: &str = "currentTime";

/// Legacy spelling of `running` used by first-generation browser clients
const LEGACY_RUNNING_FIELD: &str = "isPlaying";

/// External command that overrides position and/or run state
///
/// Absent fields leave the corresponding clock field untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    /// New position in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,

    /// New run state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
}

impl Correction {
    /// Seek to `position`
    pub fn seek(position: f64) -> Self {
        Self {
            position: Some(position),
            running: None,
        }
    }

    /// Resume advancement
    pub fn play() -> Self {
        Self {
            position: None,
            running: Some(true),
        }
    }

    /// Stop advancement
    pub fn pause() -> Self {
        Self {
            position: None,
            running: Some(false),
        }
    }

    /// True when neither field is present
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.running.is_none()
    }

    /// Parse and validate a raw JSON body
    ///
    /// `null` counts as absent, unknown fields are ignored, and the legacy
    /// `currentTime` / `isPlaying` names are accepted when the canonical
    /// names are missing.
    pub fn from_json(body: &Value) -> Result<Self> {
        let object = body.as_object().ok_or_else(|| {
            Error::InvalidCommand(format!(
                "correction body must be a JSON object, got {}",
                json_type_name(body)
            ))
        })?;

        let field = |canonical: &'static str, legacy: &'static str| {
            match object.get(canonical) {
                Some(Value::Null) | None => object
                    .get(legacy)
                    .filter(|v| !v.is_null())
                    .map(|v| (legacy, v)),
                Some(v) => Some((canonical, v)),
            }
        };

        let position = match field("position", LEGACY_POSITION_FIELD) {
            Some((name, value)) => {
                let p = value.as_f64().ok_or_else(|| {
                    Error::InvalidCommand(format!(
                        "{} must be a number, got {}",
                        name,
                        json_type_name(value)
                    ))
                })?;
                Some(validate_position(p)?)
            }
            None => None,
        };

        let running = match field("running", LEGACY_RUNNING_FIELD) {
            Some((name, value)) => Some(value.as_bool().ok_or_else(|| {
                Error::InvalidCommand(format!(
                    "{} must be a boolean, got {}",
                    name,
                    json_type_name(value)
                ))
            })?),
            None => None,
        };

        Ok(Self { position, running })
    }
}

/// Check that a position is finite and non-negative
pub fn validate_position(position: f64) -> Result<f64> {
    if !position.is_finite() {
        return Err(Error::InvalidCommand(format!(
            "position must be finite, got {}",
            position
        )));
    }
    if position < 0.0 {
        return Err(Error::InvalidCommand(format!(
            "position must be >= 0, got {}",
            position
        )));
    }
    Ok(position)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Response body returned to the caller that issued a correction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResponse {
    /// Always `true` on the success path
    pub success: bool,

    /// Position after the correction was applied
    pub position: f64,

    /// Run state after the correction was applied
    pub running: bool,
}
