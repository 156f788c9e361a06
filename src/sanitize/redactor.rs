use super::patterns::redact_bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directories removed wholesale before traversal reaches them
const DENIED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    "venv",
    ".venv",
    "virtualenv",
    "node_modules",
    "bower_components",
    ".tox",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
];

/// File extensions that carry key material
const DANGEROUS_EXTENSIONS: &[&str] = &[
    "pem", "key", "p12", "pfx", "crt", "cer", "der", "jks", "keystore", "ppk",
];

/// Exact file names that carry credentials
const DANGEROUS_NAMES: &[&str] = &[
    ".env",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
    ".netrc",
    ".npmrc",
    ".pypirc",
    ".htpasswd",
    "credentials.json",
    "service-account.json",
];

/// Extensions scanned and rewritten for inline secrets
const TEXT_EXTENSIONS: &[&str] = &[
    "py", "pyw", "txt", "md", "rst", "json", "yml", "yaml", "ini", "cfg", "conf", "toml",
    "properties", "xml", "html", "js", "ts", "java", "rb", "php", "go", "rs", "c", "h", "cpp",
    "cs", "sh", "bash", "sql", "tf", "dockerfile",
];

#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("Source tree not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("Source tree root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// A single file or directory that could not be processed
#[derive(Debug, Clone)]
pub struct SanitizeFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for SanitizeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Summary of one sanitize pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionStats {
    /// Deleted directories and files, one per deletion
    pub files_removed: usize,
    /// Files whose content changed
    pub files_modified: usize,
    /// Total secret occurrences replaced with the marker
    pub secrets_redacted: usize,
    /// Non-fatal per-entry failures
    pub issues: Vec<String>,
}

impl RedactionStats {
    fn record(&mut self, failure: SanitizeFailure) {
        warn!("Sanitize issue: {}", failure);
        self.issues.push(failure.to_string());
    }
}

/// Strips dangerous files and inline secrets from a source tree in place
#[derive(Debug, Default, Clone, Copy)]
pub struct Redactor;

impl Redactor {
    pub fn new() -> Self {
        Self
    }

    /// Sanitizes `root` in place.
    ///
    /// Denied directories are deleted before traversal descends into them, so
    /// nothing beneath them is visited. Per-entry failures are collected in
    /// [`RedactionStats::issues`]; only a missing root is fatal.
    pub fn sanitize(&self, root: &Path) -> Result<RedactionStats, SanitizeError> {
        if !root.exists() {
            return Err(SanitizeError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(SanitizeError::NotADirectory(root.to_path_buf()));
        }

        info!("Sanitizing source tree: {}", root.display());
        let mut stats = RedactionStats::default();

        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    stats.record(SanitizeFailure {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if is_denied_dir(&name) {
                    walker.skip_current_dir();
                    match fs::remove_dir_all(path) {
                        Ok(()) => {
                            debug!("Removed denied directory: {}", path.display());
                            stats.files_removed += 1;
                        }
                        Err(e) => stats.record(SanitizeFailure {
                            path: path.to_path_buf(),
                            reason: format!("failed to remove directory: {}", e),
                        }),
                    }
                }
                continue;
            }

            if is_dangerous_file(&name) {
                match fs::remove_file(path) {
                    Ok(()) => {
                        debug!("Removed sensitive file: {}", path.display());
                        stats.files_removed += 1;
                    }
                    Err(e) => stats.record(SanitizeFailure {
                        path: path.to_path_buf(),
                        reason: format!("failed to remove file: {}", e),
                    }),
                }
                continue;
            }

            // Symlinks are never read through; they may point outside the tree.
            if file_type.is_symlink() {
                stats.record(SanitizeFailure {
                    path: path.to_path_buf(),
                    reason: "symbolic link not scanned".to_string(),
                });
                continue;
            }
            if !file_type.is_file() || !is_text_file(&name) {
                continue;
            }

            match scrub_file(path) {
                Ok(0) => {}
                Ok(replaced) => {
                    debug!(
                        "Redacted {} secret(s) in {}",
                        replaced,
                        path.display()
                    );
                    stats.files_modified += 1;
                    stats.secrets_redacted += replaced;
                }
                Err(e) => stats.record(SanitizeFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }),
            }
        }

        info!(
            files_removed = stats.files_removed,
            files_modified = stats.files_modified,
            secrets_redacted = stats.secrets_redacted,
            issues = stats.issues.len(),
            "Sanitize complete"
        );

        Ok(stats)
    }
}

/// Rewrites the file only when redaction changed its content; returns the
/// number of replacements written.
fn scrub_file(path: &Path) -> std::io::Result<usize> {
    let original = fs::read(path)?;
    let (redacted, replaced) = redact_bytes(&original);
    if redacted == original {
        return Ok(0);
    }
    fs::write(path, &redacted)?;
    Ok(replaced)
}

pub fn is_denied_dir(name: &str) -> bool {
    DENIED_DIRS.contains(&name)
}

pub fn is_dangerous_file(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    if DANGEROUS_NAMES.contains(&lowered.as_str()) || lowered.starts_with(".env.") {
        return true;
    }
    extension_of(name)
        .map(|ext| DANGEROUS_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn is_text_file(name: &str) -> bool {
    if name.eq_ignore_ascii_case("dockerfile") {
        return true;
    }
    extension_of(name)
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
