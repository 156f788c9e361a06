//! Legacy code analysis

use super::report::{canonicalize_keys, AnalysisReport, ANALYSIS_KEY_ALIASES, ANALYSIS_REQUIRED_KEYS};
use crate::extract::{require_keys, StructuredExtractor};
use crate::llm::{Completion, GenerationRequest, GenerativeClient, TaskKind};
use std::fmt::Write as _;
use tracing::{info, warn};

/// Builds the analysis prompt for `code`.
pub fn analysis_prompt(filename: &str, code: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Filename: {}", filename);
    prompt.push_str(concat!(
        "Analyze this legacy Python code for modernization.\n",
        "Respond with a single JSON object with this structure:\n",
        "{\n",
        "  \"target_filename\": \"name of the file\",\n",
        "  \"detected_issues\": [\n",
        "    {\"kind\": \"ISSUE_TYPE\", \"severity\": \"CRITICAL|HIGH|MEDIUM|LOW\", \"line\": 1,\n",
        "     \"description\": \"what is wrong\", \"suggestion\": \"how to fix it\"}\n",
        "  ],\n",
        "  \"detected_patterns\": [\"legacy pattern\"],\n",
        "  \"frameworks\": [\"flask\"],\n",
        "  \"recommendation\": \"overall recommendation\",\n",
        "  \"difficulty_score\": 5,\n",
        "  \"estimated_minutes\": 30\n",
        "}\n\n",
        "Look for Python 2 syntax, missing type hints, blocking I/O, deprecated\n",
        "libraries, hard-coded configuration and missing error handling.\n\n",
    ));
    let _ = writeln!(prompt, "Code:\n```python\n{}\n```\n", code);
    prompt.push_str("Return only the JSON object, without markdown or commentary.\n");
    prompt
}

/// Produces analysis reports from the generative client
///
/// Analysis never fails the pipeline: unusable output and unavailable
/// backends both degrade to [`AnalysisReport::fallback`].
#[derive(Debug, Clone)]
pub struct Auditor {
    client: GenerativeClient,
    extractor: StructuredExtractor,
}

impl Auditor {
    pub fn new(client: GenerativeClient) -> Self {
        Self {
            client,
            extractor: StructuredExtractor::new(),
        }
    }

    pub async fn analyze(&self, filename: &str, code: &str) -> AnalysisReport {
        let request = GenerationRequest::new(TaskKind::Analysis, analysis_prompt(filename, code));

        let mut map = match self.client.complete(&request).await {
            Ok(Completion::Structured(map)) => map,
            Ok(Completion::Text(text)) => {
                match self
                    .extractor
                    .extract(&text, Some(AnalysisReport::fallback_map(filename)))
                {
                    Ok(map) => map,
                    Err(e) => {
                        warn!("Analysis output unusable: {}", e);
                        return AnalysisReport::fallback(filename);
                    }
                }
            }
            Err(e) => {
                warn!("Analysis generation failed, using fallback report: {}", e);
                return AnalysisReport::fallback(filename);
            }
        };

        canonicalize_keys(&mut map, ANALYSIS_KEY_ALIASES);
        if let Err(e) = require_keys(&map, ANALYSIS_REQUIRED_KEYS) {
            warn!("{}; filling defaults", e);
        }

        let report = match AnalysisReport::from_map(map, filename) {
            Ok(report) => report,
            Err(e) => {
                warn!("Analysis output has unexpected field types: {}", e);
                return AnalysisReport::fallback(filename);
            }
        };

        info!(
            "Analysis complete: {} issues found in {}",
            report.issue_count(),
            report.target_filename
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{BackendError, MockGenerativeBackend, MockResponse, SimulatorBackend};
    use std::sync::Arc;

    fn auditor(mock: &Arc<MockGenerativeBackend>) -> Auditor {
        Auditor::new(GenerativeClient::new(mock.clone()))
    }

    #[test]
    fn test_prompt_carries_filename_and_code() {
        let prompt = analysis_prompt("legacy.py", "print 'hi'");
        assert!(prompt.starts_with("Filename: legacy.py\n"));
        assert!(prompt.contains("```python\nprint 'hi'\n```"));
        assert!(prompt.contains("CRITICAL|HIGH|MEDIUM|LOW"));
    }

    #[tokio::test]
    async fn test_analyze_parses_model_text() {
        let mock = Arc::new(MockGenerativeBackend::new());
        mock.add_response(MockResponse::text(
            r#"```json
{"filename": "legacy.py", "issues": [{"type": "PY2_PRINT", "severity": "CRITICAL", "description": "print statement", "suggestion": "print()"}], "patterns": ["py2"], "recommendation": "Port to py3"}
```"#,
        ));

        let report = auditor(&mock).analyze("legacy.py", "print 'hi'").await;
        assert_eq!(report.issue_count(), 1);
        assert_eq!(report.detected_issues[0].kind, "PY2_PRINT");
        assert_eq!(report.recommendation, "Port to py3");
        assert_eq!(mock.requests()[0].task, TaskKind::Analysis);
    }

    #[tokio::test]
    async fn test_analyze_degrades_on_garbage() {
        let mock = Arc::new(MockGenerativeBackend::new());
        mock.add_response(MockResponse::text("no json here"));

        let report = auditor(&mock).analyze("app.py", "x = 1").await;
        assert_eq!(report, AnalysisReport::fallback("app.py"));
    }

    #[tokio::test]
    async fn test_analyze_degrades_on_backend_failure() {
        let mock = Arc::new(MockGenerativeBackend::new());
        mock.add_response(MockResponse::error(BackendError::NetworkError {
            message: "connection refused".to_string(),
        }));

        let report = auditor(&mock).analyze("main.py", "x = 1").await;
        assert_eq!(report.target_filename, "main.py");
        assert_eq!(report, AnalysisReport::fallback("main.py"));
    }

    #[tokio::test]
    async fn test_analyze_with_simulator() {
        let auditor = Auditor::new(GenerativeClient::new(Arc::new(SimulatorBackend::new())));
        let report = auditor.analyze("server.py", "import urllib2").await;
        assert_eq!(report.target_filename, "server.py");
        assert_eq!(report.estimated_minutes, Some(30));
        assert!(!report.detected_issues.is_empty());
    }
}
