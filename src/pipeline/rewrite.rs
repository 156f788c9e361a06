//! Code rewrite requests and their results

use super::error::AttemptError;
use super::report::{canonicalize_keys, lenient_strings};
use super::retry_context::RewriteContext;
use crate::extract::{require_keys, ExtractError, StructuredExtractor, StructuredMap, PREVIEW_CHARS};
use crate::llm::{Completion, GenerationRequest, GenerativeClient, TaskKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fmt::Write as _;
use tracing::{debug, info};

/// Keys a rewrite mapping must carry once aliases are resolved
pub const REWRITE_REQUIRED_KEYS: &[&str] = &["rewritten_code", "build_manifest"];

const REWRITE_KEY_ALIASES: &[(&str, &str)] = &[
    ("refactored_code", "rewritten_code"),
    ("dockerfile", "build_manifest"),
    ("changes_made", "changes"),
];

const PROMPT_ISSUES: usize = 5;
const DISPLAYED_ITEMS: usize = 8;

/// Modernised code plus the descriptor needed to build it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteResult {
    #[serde(default)]
    pub rewritten_code: String,
    #[serde(default)]
    pub build_manifest: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub changes: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub new_features: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub breaking_changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_notes: Option<String>,
}

impl RewriteResult {
    /// Builds a result from a model mapping, resolving key aliases and
    /// requiring the code and manifest keys.
    pub fn from_map(mut map: StructuredMap) -> Result<Self, ExtractError> {
        canonicalize_keys(&mut map, REWRITE_KEY_ALIASES);
        require_keys(&map, REWRITE_REQUIRED_KEYS)?;
        serde_json::from_value(Value::Object(map)).map_err(|e| ExtractError::MalformedOutput {
            preview: e.to_string().chars().take(PREVIEW_CHARS).collect(),
        })
    }

    /// Both the code and the build manifest must be non-blank.
    pub fn validate(&self) -> Result<(), AttemptError> {
        if self.rewritten_code.trim().is_empty() {
            return Err(AttemptError::InvalidRewrite {
                field: "rewritten_code",
            });
        }
        if self.build_manifest.trim().is_empty() {
            return Err(AttemptError::InvalidRewrite {
                field: "build_manifest",
            });
        }
        Ok(())
    }
}

impl fmt::Display for RewriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "REFACTORING REPORT")?;
        writeln!(f, "{}", rule)?;

        writeln!(f, "CHANGES MADE:")?;
        for change in self.changes.iter().take(DISPLAYED_ITEMS) {
            writeln!(f, "  ✓ {}", change)?;
        }

        if !self.new_features.is_empty() {
            writeln!(f)?;
            writeln!(f, "NEW FEATURES:")?;
            for feature in self.new_features.iter().take(DISPLAYED_ITEMS) {
                writeln!(f, "  + {}", feature)?;
            }
        }

        if !self.breaking_changes.is_empty() {
            writeln!(f)?;
            writeln!(f, "BREAKING CHANGES:")?;
            for change in &self.breaking_changes {
                writeln!(f, "  ! {}", change)?;
            }
        }

        write!(f, "{}", rule)
    }
}

/// Builds the rewrite prompt for `code` under `context`.
///
/// The original code is always the first fenced block of the prompt.
pub fn rewrite_prompt(filename: &str, code: &str, context: &RewriteContext<'_>) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Filename: {}", filename);
    let _ = writeln!(
        prompt,
        "Rewrite this Python code to Python 3.11 with modern patterns."
    );
    let _ = writeln!(
        prompt,
        "Respond with a single JSON object with exactly these keys:"
    );
    prompt.push_str(concat!(
        "{\n",
        "  \"rewritten_code\": \"complete modernised source\",\n",
        "  \"build_manifest\": \"Dockerfile content, FROM python:3.11-slim ...\",\n",
        "  \"changes\": [\"change\"],\n",
        "  \"new_features\": [\"feature\"],\n",
        "  \"breaking_changes\": [],\n",
        "  \"migration_notes\": \"steps needed to migrate\"\n",
        "}\n\n",
    ));

    let _ = writeln!(prompt, "Original code:\n```python\n{}\n```\n", code);

    let _ = writeln!(prompt, "Issues found:");
    for issue in context.report.detected_issues.iter().take(PROMPT_ISSUES) {
        let _ = writeln!(prompt, "  - {}: {}", issue.kind, issue.description);
    }
    let _ = writeln!(prompt, "Recommendation: {}\n", context.report.recommendation);

    prompt.push_str(concat!(
        "Requirements:\n",
        "- Python 3.11+\n",
        "- Type hints on every function\n",
        "- async/await where I/O is involved\n",
        "- PEP 8 formatting\n",
        "- Preserve all original behaviour\n",
        "- Docstrings on public functions\n\n",
    ));

    let failure = context.render_failure();
    if !failure.is_empty() {
        prompt.push_str(&failure);
        prompt.push('\n');
    }

    prompt.push_str("Return only the JSON object, without markdown or commentary.\n");
    prompt
}

/// Requests rewrites from the generative client
#[derive(Debug, Clone)]
pub struct Refactorer {
    client: GenerativeClient,
    extractor: StructuredExtractor,
}

impl Refactorer {
    pub fn new(client: GenerativeClient) -> Self {
        Self {
            client,
            extractor: StructuredExtractor::new(),
        }
    }

    /// Produces a validated rewrite, or the reason this attempt failed.
    pub async fn rewrite(
        &self,
        filename: &str,
        code: &str,
        context: &RewriteContext<'_>,
    ) -> Result<RewriteResult, AttemptError> {
        let request = GenerationRequest::new(TaskKind::Rewrite, rewrite_prompt(filename, code, context));
        let map = match self.client.complete(&request).await? {
            Completion::Structured(map) => map,
            Completion::Text(text) => self.extractor.extract(&text, None)?,
        };

        let result = RewriteResult::from_map(map)?;
        result.validate()?;

        debug!(
            iteration = context.iteration,
            changes = result.changes.len(),
            "Rewrite accepted structurally"
        );
        info!(
            "Refactoring produced {} bytes of code with {} change(s)",
            result.rewritten_code.len(),
            result.changes.len()
        );
        Ok(result)
    }
}
