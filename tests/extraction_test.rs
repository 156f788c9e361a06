//! Structured extraction integration tests
//!
//! Model output arrives in many shapes; every wrapping of a valid object
//! must recover the same mapping, and analysis must degrade instead of
//! failing when nothing can be recovered.

use retrofit::extract::{classify_build_error, require_keys, ExtractError, StructuredExtractor};
use retrofit::llm::{GenerativeClient, MockGenerativeBackend, MockResponse};
use retrofit::pipeline::{Auditor, Severity, NO_RECOMMENDATION};
use serde_json::{json, Value};
use std::sync::Arc;
use yare::parameterized;

fn analysis_object() -> Value {
    json!({
        "target_filename": "app.py",
        "detected_issues": [
            {"type": "PYTHON2_SYNTAX", "severity": "HIGH", "line": 3,
             "description": "print statement", "suggestion": "use print()"}
        ],
        "detected_patterns": ["python2_print"],
        "recommendation": "Port to Python 3"
    })
}

#[parameterized(
    bare = { "{json}" },
    fenced_with_tag = { "```json\n{json}\n```" },
    fenced_without_tag = { "```\n{json}\n```" },
    padded_fence = { "   ```json\n{json}\n```   \n" },
    leading_prose = { "Here is the analysis you asked for:\n{json}" },
    trailing_prose = { "{json}\n\nLet me know if you need anything else." },
    prose_both_sides = { "Result:\n{json}\nDone." },
)]
fn test_wrapped_object_is_recovered(template: &str) {
    let expected = analysis_object();
    let raw = template.replace("{json}", &serde_json::to_string_pretty(&expected).unwrap());

    let map = StructuredExtractor::new().extract(&raw, None).unwrap();
    assert_eq!(Value::Object(map), expected);
}

#[parameterized(
    refusal = { "I'm sorry, I can't help with that." },
    empty = { "" },
    unbalanced = { "{\"target_filename\": \"app.py\"" },
    array = { "[1, 2, 3]" },
)]
fn test_unrecoverable_output_uses_fallback(raw: &str) {
    let extractor = StructuredExtractor::new();
    assert!(matches!(
        extractor.extract(raw, None),
        Err(ExtractError::MalformedOutput { .. })
    ));

    let fallback = json!({"recommendation": "manual review"})
        .as_object()
        .cloned()
        .unwrap();
    assert_eq!(extractor.extract(raw, Some(fallback.clone())).unwrap(), fallback);
}

#[test]
fn test_missing_keys_reported_in_order() {
    let map = json!({"rewritten_code": "x"}).as_object().cloned().unwrap();
    let err = require_keys(&map, &["rewritten_code", "build_manifest", "changes"]).unwrap_err();
    assert_eq!(
        err,
        ExtractError::SchemaViolation {
            missing: vec!["build_manifest".to_string(), "changes".to_string()]
        }
    );
    assert_eq!(
        err.to_string(),
        "Model output is missing required keys: build_manifest, changes"
    );
}

#[tokio::test]
async fn test_auditor_reads_fenced_analysis() {
    let mock = Arc::new(MockGenerativeBackend::new());
    mock.add_response(MockResponse::text(format!(
        "```json\n{}\n```",
        analysis_object()
    )));

    let report = Auditor::new(GenerativeClient::new(mock))
        .analyze("app.py", "print 'hi'\n")
        .await;

    assert_eq!(report.target_filename, "app.py");
    assert_eq!(report.issue_count(), 1);
    assert_eq!(report.detected_issues[0].severity, Severity::High);
    assert_eq!(report.detected_issues[0].line, Some(3));
    assert_eq!(report.recommendation, "Port to Python 3");
}

#[tokio::test]
async fn test_auditor_fills_missing_recommendation() {
    let mock = Arc::new(MockGenerativeBackend::new());
    mock.add_response(MockResponse::structured(json!({
        "target_filename": "app.py",
        "detected_issues": [],
        "detected_patterns": []
    })));

    let report = Auditor::new(GenerativeClient::new(mock))
        .analyze("app.py", "x = 1\n")
        .await;

    assert_eq!(report.recommendation, NO_RECOMMENDATION);
    assert_eq!(report.issue_count(), 0);
}

#[parameterized(
    missing_module = { "Step 3/5\nModuleNotFoundError: No module named 'flask'", "missing_module" },
    syntax = { "  File \"app.py\", line 12\nSyntaxError: invalid syntax", "syntax_error" },
    indentation = { "IndentationError: unexpected indent", "indentation_error" },
    unknown = { "exit code 137", "unknown" },
)]
fn test_build_log_classification(log: &str, expected: &str) {
    assert_eq!(classify_build_error(log).error_type, expected);
}

#[test]
fn test_build_log_line_number() {
    let info = classify_build_error("  File \"app.py\", line 12\nSyntaxError: invalid syntax");
    assert_eq!(info.line_number, Some(12));
    assert!(info.message.contains("SyntaxError"));
}
