//! Deterministic built-in generative backend
//!
//! Used when no real backend is reachable. Output is a pure function of the
//! request and always satisfies the required-key contracts of analysis and
//! rewrite results, so downstream code does not care which backend answered.

use super::client::{BackendKind, GenerativeBackend};
use super::error::BackendError;
use super::types::{Completion, GenerationRequest, TaskKind};
use crate::build::default_manifest;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

const DEFAULT_FILENAME: &str = "app.py";
const FILENAME_MARKER: &str = "Filename:";
const SIMULATED_HEADER: &str = "# Modernized (simulated)\n";

#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatorBackend;

impl SimulatorBackend {
    pub fn new() -> Self {
        Self
    }

    fn analysis(prompt: &str) -> Map<String, Value> {
        let filename = filename_from_prompt(prompt);
        let value = json!({
            "target_filename": filename,
            "detected_issues": [{
                "kind": "LEGACY_PATTERN",
                "severity": "MEDIUM",
                "line": null,
                "description": "Simulated analysis: no generative backend is configured",
                "suggestion": "Configure a model backend for a real analysis"
            }],
            "detected_patterns": ["synchronous_io", "outdated_imports"],
            "recommendation": "Modernize to current Python idioms with type hints and async I/O.",
            "difficulty_score": 5,
            "estimated_minutes": 30,
            "frameworks": []
        });
        into_map(value)
    }

    fn rewrite(prompt: &str) -> Map<String, Value> {
        let filename = filename_from_prompt(prompt);
        let original = first_code_block(prompt).unwrap_or("print(\"hello\")\n");
        let value = json!({
            "rewritten_code": format!("{}{}", SIMULATED_HEADER, original),
            "build_manifest": default_manifest(&filename),
            "changes": ["Added modernization header"],
            "new_features": [],
            "breaking_changes": [],
            "migration_notes": "Simulated rewrite; code is otherwise unchanged."
        });
        into_map(value)
    }
}

#[async_trait]
impl GenerativeBackend for SimulatorBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion, BackendError> {
        debug!("Simulator answering {:?} request", request.task);
        let map = match request.task {
            TaskKind::Analysis => Self::analysis(&request.prompt),
            TaskKind::Rewrite => Self::rewrite(&request.prompt),
        };
        Ok(Completion::Structured(map))
    }

    fn name(&self) -> &str {
        "simulator"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulator
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn filename_from_prompt(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix(FILENAME_MARKER))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FILENAME)
        .to_string()
}

fn first_code_block(prompt: &str) -> Option<&str> {
    let open = prompt.find("```")?;
    let after_open = &prompt[open + 3..];
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}
