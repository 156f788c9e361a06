use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

const MESSAGE_CHARS: usize = 200;

/// Error classes recognised in build and runtime logs, most specific first.
const ERROR_CLASSES: &[(&str, &str)] = &[
    ("ModuleNotFoundError", "missing_module"),
    ("ImportError", "import_error"),
    ("IndentationError", "indentation_error"),
    ("SyntaxError", "syntax_error"),
    ("TypeError", "type_error"),
    ("AttributeError", "attribute_error"),
    ("NameError", "name_error"),
    ("KeyError", "key_error"),
    ("ValueError", "value_error"),
    ("FileNotFoundError", "file_not_found"),
];

static LINE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"line (\d+)").unwrap_or_else(|e| panic!("invalid line-number pattern: {}", e))
});

/// Summary of a failed build's log, folded into the next rewrite prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildErrorInfo {
    pub error_type: String,
    pub line_number: Option<u32>,
    pub message: String,
}

/// Classifies the first recognised error in `log`.
///
/// `error_type` is `"unknown"` when nothing matches. The message is the first
/// non-empty line mentioning the error class, or the first non-empty line of
/// the log, truncated.
pub fn classify_build_error(log: &str) -> BuildErrorInfo {
    let found = ERROR_CLASSES
        .iter()
        .find(|(needle, _)| log.contains(needle));

    let error_type = found.map_or("unknown", |(_, kind)| kind).to_string();

    let message_line = found
        .and_then(|(needle, _)| log.lines().find(|l| l.contains(needle)))
        .or_else(|| log.lines().find(|l| !l.trim().is_empty()))
        .unwrap_or("")
        .trim();

    let line_number = LINE_NUMBER
        .captures(log)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    BuildErrorInfo {
        error_type,
        line_number,
        message: message_line.chars().take(MESSAGE_CHARS).collect(),
    }
}
