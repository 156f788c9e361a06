//! Generation request/response types
//!
//! These types are independent of any specific backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a generation request is for
///
/// The simulator uses this to decide which schema-shaped mapping to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Legacy-code analysis producing an analysis report
    Analysis,
    /// Code rewrite producing modernised code and a build manifest
    Rewrite,
}

/// Output format hint passed to the backend
///
/// Backends may ignore it; callers always run output through the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
}

/// Request to send to a generative backend
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub task: TaskKind,
    pub prompt: String,
    pub response_format: ResponseFormat,
}

impl GenerationRequest {
    pub fn new(task: TaskKind, prompt: impl Into<String>) -> Self {
        Self {
            task,
            prompt: prompt.into(),
            response_format: ResponseFormat::Json,
        }
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }
}

/// Result of a generation call
///
/// Real backends return text that still needs structured extraction; the
/// simulator returns a mapping that is directly usable.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    Structured(Map<String, Value>),
}

impl Completion {
    /// True for text that is empty or whitespace only
    pub fn is_empty(&self) -> bool {
        match self {
            Completion::Text(text) => text.trim().is_empty(),
            Completion::Structured(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Completion::Text(text) => Some(text),
            Completion::Structured(_) => None,
        }
    }
}
