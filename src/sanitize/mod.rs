//! Secret and PII redaction for uploaded source trees
//!
//! The [`Redactor`] runs before any code leaves the trust boundary: it deletes
//! version-control metadata, virtual environments, caches and credential files,
//! then rewrites text files with every detected secret replaced by
//! [`REDACTION_MARKER`].

mod patterns;
mod redactor;

pub use patterns::{builtin_patterns, redact_bytes, redact_text, SecretPattern, REDACTION_MARKER};
pub use redactor::{
    is_dangerous_file, is_denied_dir, is_text_file, RedactionStats, Redactor, SanitizeError,
    SanitizeFailure,
};
