//! Extraction of the audio location from the remote service's response.
//!
//! The service answers either flat:
//!
//! ```json
//! { "s3_url": "https://..." }
//! ```
//!
//! or gateway-style, with the real payload serialized into `body`:
//!
//! ```json
//! { "statusCode": 200, "body": "{\"audioUrl\": \"https://...\"}" }
//! ```
//!
//! Both shapes are accepted without knowing in advance which one arrives.

use std::fmt;

use serde_json::Value;

use crate::error::EnvelopeError;

const S3_URL: &str = "s3_url";
const AUDIO_URL: &str = "audioUrl";
const BODY: &str = "body";

/// A resolved, playable audio URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioLocation(String);

impl AudioLocation {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AudioLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a raw response body.
pub fn parse_str(raw: &str) -> Result<AudioLocation, EnvelopeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| EnvelopeError::Undecodable(e.to_string()))?;
    parse(&value)
}

/// Find the audio location in a decoded response.
///
/// A top-level `s3_url` wins outright. Otherwise the value is unwrapped at
/// most twice (a string-encoded document, then a string-encoded `body`) and
/// `audioUrl`, then `s3_url`, is looked up on the innermost object. The
/// object wrapping `body` is searched the same way when that finds nothing.
pub fn parse(raw: &Value) -> Result<AudioLocation, EnvelopeError> {
    if let Some(url) = non_empty_str(raw, S3_URL) {
        return Ok(AudioLocation(url.to_string()));
    }

    let outer = match raw {
        Value::String(encoded) => unwrap_encoded(encoded).unwrap_or_else(|| raw.clone()),
        _ => raw.clone(),
    };

    let inner = match outer.get(BODY) {
        Some(Value::String(encoded)) => unwrap_encoded(encoded),
        Some(body @ Value::Object(_)) => Some(body.clone()),
        _ => None,
    };
    let target = inner.as_ref().unwrap_or(&outer);

    // Innermost object first, then the wrapper around it.
    if let Some(url) = [target, &outer].into_iter().find_map(|object| {
        [AUDIO_URL, S3_URL]
            .iter()
            .find_map(|field| non_empty_str(object, field))
    }) {
        return Ok(AudioLocation(url.to_string()));
    }

    if let Some(message) = target.get("error").and_then(Value::as_str) {
        log::warn!("Synthesis service reported an error: {message}");
    }
    Err(EnvelopeError::MissingField)
}

fn unwrap_encoded(encoded: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(encoded) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(e) => {
            log::debug!("String field is not an encoded JSON object: {e}");
            None
        }
    }
}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
