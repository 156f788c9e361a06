//! Structured-output recovery from free-form model text
//!
//! Generative backends are asked for JSON but frequently wrap it in markdown
//! fences or surround it with narrative text. [`StructuredExtractor`] recovers
//! the JSON object when possible and otherwise degrades to a caller-supplied
//! fallback or fails with [`ExtractError::MalformedOutput`].

mod build_log;

pub use build_log::{classify_build_error, BuildErrorInfo};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Characters of the raw text kept in [`ExtractError::MalformedOutput`]
pub const PREVIEW_CHARS: usize = 200;

/// A JSON object recovered from model output
pub type StructuredMap = Map<String, Value>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractError {
    #[error("Model output is not a JSON object: {preview}")]
    MalformedOutput { preview: String },

    #[error("Model output is missing required keys: {}", .missing.join(", "))]
    SchemaViolation { missing: Vec<String> },
}

/// Recovers JSON objects from generative-model text
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts a JSON object from `raw`.
    ///
    /// Strategies, first success wins:
    /// 1. strip a surrounding markdown fence (with or without language tag) and parse strictly
    /// 2. parse the span from the first `{` to the last `}` of the original text
    /// 3. return `fallback` if given, otherwise [`ExtractError::MalformedOutput`]
    pub fn extract(
        &self,
        raw: &str,
        fallback: Option<StructuredMap>,
    ) -> Result<StructuredMap, ExtractError> {
        if let Some(map) = parse_object(strip_fence(raw)) {
            debug!("Parsed structured output after fence stripping");
            return Ok(map);
        }

        if let Some(map) = brace_span(raw).and_then(parse_object) {
            debug!("Parsed structured output from brace span");
            return Ok(map);
        }

        if let Some(fallback) = fallback {
            warn!("Structured output unparseable, using fallback");
            return Ok(fallback);
        }

        Err(ExtractError::MalformedOutput {
            preview: raw.chars().take(PREVIEW_CHARS).collect(),
        })
    }

    /// Extracts and then requires every key in `required`.
    pub fn extract_required(
        &self,
        raw: &str,
        required: &[&str],
        fallback: Option<StructuredMap>,
    ) -> Result<StructuredMap, ExtractError> {
        let map = self.extract(raw, fallback)?;
        require_keys(&map, required)?;
        Ok(map)
    }
}

/// Fails with [`ExtractError::SchemaViolation`] listing every key of
/// `required` absent from `map`, in the order given.
pub fn require_keys(map: &StructuredMap, required: &[&str]) -> Result<(), ExtractError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|key| !map.contains_key(**key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ExtractError::SchemaViolation { missing })
    }
}

fn strip_fence(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Language tag runs to the end of the opening line.
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn parse_object(text: &str) -> Option<StructuredMap> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
