//! Pipeline error taxonomy

use super::state::PipelinePhase;
use crate::build::{BuildError, BuildStatus};
use crate::extract::ExtractError;
use crate::llm::GenerationError;
use crate::sanitize::{redact_text, SanitizeError};
use crate::storage::StorageError;
use crate::workspace::WorkspaceError;
use std::path::PathBuf;
use thiserror::Error;

const DIAGNOSTIC_CHARS: usize = 300;

/// Why a single self-healing iteration did not produce an accepted rewrite
///
/// These never leave the retry loop; they are folded into the next
/// iteration's context.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Rewrite has an empty {field}")]
    InvalidRewrite { field: &'static str },

    #[error("Verification build could not run: {0}")]
    Verification(#[from] BuildError),

    #[error("Verification build {build_id} finished with {status}")]
    BuildFailed {
        build_id: String,
        status: BuildStatus,
        logs: String,
    },
}

impl AttemptError {
    /// Build output associated with the failure, when it came from a build
    pub fn build_logs(&self) -> Option<&str> {
        match self {
            AttemptError::BuildFailed { logs, .. } => Some(logs),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No non-empty Python source file found under {}", .0.display())]
    NoSourceFound(PathBuf),

    #[error("Refactoring failed after {attempts} attempt(s): {last_failure}")]
    RefactorExhausted { attempts: u32, last_failure: String },

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Sanitize error: {0}")]
    Sanitize(#[from] SanitizeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode refactor manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// User-visible failure of a submission
///
/// `diagnostic` is redacted and truncated; it never carries raw build logs.
#[derive(Debug, Error)]
#[error("Submission {submission_id} failed during {phase} (iteration {iteration}): {diagnostic}")]
pub struct PipelineFailure {
    pub submission_id: String,
    pub phase: PipelinePhase,
    pub iteration: u32,
    pub diagnostic: String,
    #[source]
    pub source: PipelineError,
}

impl PipelineFailure {
    pub fn new(
        submission_id: impl Into<String>,
        phase: PipelinePhase,
        iteration: u32,
        source: PipelineError,
    ) -> Self {
        Self {
            submission_id: submission_id.into(),
            phase,
            iteration,
            diagnostic: diagnostic(&source.to_string()),
            source,
        }
    }
}

/// Redacts `text` and truncates it to a short single line.
pub(crate) fn diagnostic(text: &str) -> String {
    let redacted = redact_text(text);
    let line = redacted.lines().next().unwrap_or_default();
    let mut short: String = line.chars().take(DIAGNOSTIC_CHARS).collect();
    if line.chars().count() > DIAGNOSTIC_CHARS {
        short.push_str("...");
    }
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_diagnostic_is_redacted() {
        let failure = PipelineFailure::new(
            "sub-1",
            PipelinePhase::Refactoring,
            3,
            PipelineError::RefactorExhausted {
                attempts: 3,
                last_failure: "log said api_key = \"AKIA1234567890ABCDEF\"".to_string(),
            },
        );
        assert!(!failure.diagnostic.contains("AKIA1234567890ABCDEF"));
        assert!(failure.diagnostic.contains("3 attempt(s)"));

        let text = failure.to_string();
        assert!(text.contains("sub-1"));
        assert!(text.contains("refactoring"));
        assert!(!text.contains("AKIA1234567890ABCDEF"));
    }

    #[test]
    fn test_diagnostic_truncates_to_first_line() {
        let long = format!("{}\nsecond line", "x".repeat(500));
        let short = diagnostic(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.len(), DIAGNOSTIC_CHARS + 3);
        assert!(!short.contains("second line"));
    }

    #[test]
    fn test_build_logs_only_for_build_failures() {
        let failed = AttemptError::BuildFailed {
            build_id: "b".to_string(),
            status: BuildStatus::Failure,
            logs: "ModuleNotFoundError".to_string(),
        };
        assert_eq!(failed.build_logs(), Some("ModuleNotFoundError"));
        assert!(AttemptError::InvalidRewrite { field: "rewritten_code" }
            .build_logs()
            .is_none());
    }
}
