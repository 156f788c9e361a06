//! Failure context carried from one self-healing iteration to the next

use super::error::AttemptError;
use super::report::AnalysisReport;
use crate::extract::{classify_build_error, BuildErrorInfo};
use crate::sanitize::redact_text;
use serde::Serialize;
use std::fmt::Write as _;

/// What went wrong in the previous iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureContext {
    pub failed_iteration: u32,
    pub reason: String,
    pub error: Option<BuildErrorInfo>,
    /// Head of the previous attempt's code
    pub previous_code: Option<String>,
    /// Redacted head of the build log
    pub log_excerpt: Option<String>,
}

impl FailureContext {
    /// Captures `error` from `iteration`, keeping at most `code_chars` of the
    /// attempted code and `log_chars` of the redacted build log.
    pub fn capture(
        iteration: u32,
        error: &AttemptError,
        previous_code: Option<&str>,
        code_chars: usize,
        log_chars: usize,
    ) -> Self {
        let logs = error.build_logs();
        Self {
            failed_iteration: iteration,
            reason: redact_text(&error.to_string()),
            error: logs.map(classify_build_error),
            previous_code: previous_code
                .filter(|code| !code.trim().is_empty())
                .map(|code| head(code, code_chars)),
            log_excerpt: logs.map(|logs| head(&redact_text(logs), log_chars)),
        }
    }
}

/// Input to one rewrite request
///
/// The first iteration carries only the report; later iterations also carry
/// the previous iteration's failure.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    pub report: &'a AnalysisReport,
    pub iteration: u32,
    pub max_iterations: u32,
    pub previous_failure: Option<&'a FailureContext>,
}

impl<'a> RewriteContext<'a> {
    pub fn initial(report: &'a AnalysisReport, max_iterations: u32) -> Self {
        Self {
            report,
            iteration: 1,
            max_iterations,
            previous_failure: None,
        }
    }

    pub fn retry(
        report: &'a AnalysisReport,
        iteration: u32,
        max_iterations: u32,
        failure: &'a FailureContext,
    ) -> Self {
        Self {
            report,
            iteration,
            max_iterations,
            previous_failure: Some(failure),
        }
    }

    /// Prompt section describing the previous failure, empty on a first attempt
    pub fn render_failure(&self) -> String {
        let Some(failure) = self.previous_failure else {
            return String::new();
        };

        let mut out = String::new();
        let _ = writeln!(
            out,
            "PREVIOUS ATTEMPT FAILED (iteration {} of {}; this is attempt {}):",
            failure.failed_iteration, self.max_iterations, self.iteration
        );
        let _ = writeln!(out, "Failure: {}", failure.reason);

        if let Some(error) = &failure.error {
            let _ = write!(out, "Error type: {}", error.error_type);
            if let Some(line) = error.line_number {
                let _ = write!(out, " (line {})", line);
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "Error message: {}", error.message);
        }

        if let Some(logs) = &failure.log_excerpt {
            let _ = writeln!(out, "Build log excerpt:\n{}", logs);
        }

        if let Some(code) = &failure.previous_code {
            let _ = writeln!(out, "Previously generated code (truncated):\n```python\n{}\n```", code);
        }

        let _ = writeln!(out, "Fix the failure above while keeping the original behaviour.");
        out
    }
}

fn head(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildStatus;

    #[test]
    fn test_capture_build_failure() {
        let error = AttemptError::BuildFailed {
            build_id: "sim-1".to_string(),
            status: BuildStatus::Failure,
            logs: format!(
                "Step 3/6\nModuleNotFoundError: No module named 'flask' at line 7\ntoken = \"abcdefghijklmnop1234\"\n{}",
                "x".repeat(2000)
            ),
        };
        let code = "y".repeat(5000);
        let failure = FailureContext::capture(2, &error, Some(&code), 2000, 1000);

        assert_eq!(failure.failed_iteration, 2);
        assert_eq!(failure.previous_code.as_ref().map(|c| c.len()), Some(2000));
        let logs = failure.log_excerpt.as_deref().unwrap();
        assert_eq!(logs.chars().count(), 1000);
        assert!(!logs.contains("abcdefghijklmnop1234"));
        let classified = failure.error.as_ref().unwrap();
        assert_eq!(classified.error_type, "missing_module");
        assert_eq!(classified.line_number, Some(7));
    }

    #[test]
    fn test_capture_validation_failure() {
        let error = AttemptError::InvalidRewrite {
            field: "rewritten_code",
        };
        let failure = FailureContext::capture(1, &error, Some("   "), 2000, 1000);
        assert!(failure.error.is_none());
        assert!(failure.log_excerpt.is_none());
        assert!(failure.previous_code.is_none());
        assert!(failure.reason.contains("rewritten_code"));
    }

    #[test]
    fn test_render_failure() {
        let report = AnalysisReport::fallback("app.py");
        assert!(RewriteContext::initial(&report, 3).render_failure().is_empty());

        let failure = FailureContext::capture(
            1,
            &AttemptError::InvalidRewrite {
                field: "build_manifest",
            },
            Some("print('x')"),
            2000,
            1000,
        );
        let rendered = RewriteContext::retry(&report, 2, 3, &failure).render_failure();
        assert!(rendered.contains("iteration 1 of 3"));
        assert!(rendered.contains("attempt 2"));
        assert!(rendered.contains("empty build_manifest"));
        assert!(rendered.contains("print('x')"));
    }
}
