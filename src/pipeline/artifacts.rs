//! Artifacts persisted for a completed submission
//!
//! Layout under the store, per submission:
//! `source.redacted.tar.gz`, the rewritten primary file, `Dockerfile`,
//! `requirements.txt` and `REFACTOR_MANIFEST.json`.

use super::report::AnalysisReport;
use super::rewrite::RewriteResult;
use crate::build::default_manifest;
use crate::storage::{ArtifactStore, StorageError};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "REFACTOR_MANIFEST.json";
pub const DOCKERFILE: &str = "Dockerfile";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

const BASE_REQUIREMENTS: &[&str] = &["pydantic>=2.0.0", "python-dotenv>=1.0.0"];

const FRAMEWORK_REQUIREMENTS: &[(&str, &[&str])] = &[
    ("fastapi", &["fastapi>=0.104.0", "uvicorn>=0.24.0"]),
    ("django", &["django>=4.2.0", "gunicorn>=21.0.0"]),
    ("flask", &["flask>=3.0.0", "gunicorn>=21.0.0"]),
    ("asyncio", &["aiofiles>=23.0.0"]),
    ("pydantic", &["pydantic>=2.0.0"]),
    ("sqlalchemy", &["sqlalchemy>=2.0.0"]),
];

/// Sorted, de-duplicated requirements for the detected frameworks.
pub fn requirements_txt<'a>(frameworks: impl IntoIterator<Item = &'a String>) -> String {
    let mut packages: BTreeSet<&str> = BASE_REQUIREMENTS.iter().copied().collect();
    for framework in frameworks {
        let framework = framework.to_ascii_lowercase();
        if let Some((_, extra)) = FRAMEWORK_REQUIREMENTS
            .iter()
            .find(|(name, _)| *name == framework)
        {
            packages.extend(extra.iter().copied());
        }
    }
    packages.into_iter().collect::<Vec<_>>().join("\n")
}

/// The build manifest to ship: the generated one when it declares a base
/// image, otherwise the default descriptor for `entrypoint`.
pub fn effective_manifest(result: &RewriteResult, entrypoint: &str) -> String {
    let declares_base = result
        .build_manifest
        .lines()
        .any(|line| line.trim_start().to_ascii_uppercase().starts_with("FROM "));
    if declares_base {
        result.build_manifest.clone()
    } else {
        default_manifest(entrypoint)
    }
}

/// Document summarising the accepted rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefactorManifest<'a> {
    pub rewritten_code: &'a str,
    pub build_manifest: &'a str,
    pub changes: &'a [String],
    pub new_features: &'a [String],
    pub breaking_changes: &'a [String],
    pub total_issues: usize,
    pub estimated_minutes: Option<u32>,
}

impl<'a> RefactorManifest<'a> {
    pub fn new(result: &'a RewriteResult, build_manifest: &'a str, report: &AnalysisReport) -> Self {
        Self {
            rewritten_code: &result.rewritten_code,
            build_manifest,
            changes: &result.changes,
            new_features: &result.new_features,
            breaking_changes: &result.breaking_changes,
            total_issues: report.issue_count(),
            estimated_minutes: report.estimated_minutes,
        }
    }
}

/// Locators of the persisted files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactLocations {
    pub source_archive: String,
    pub rewritten_code: Option<String>,
    pub build_manifest: Option<String>,
    pub requirements: Option<String>,
    pub refactor_manifest: Option<String>,
}

pub(crate) fn key(submission_id: &str, name: &str) -> String {
    format!("{}/{}", submission_id, name)
}

/// Stores the sanitized archive under `{submission_id}/{archive name}`.
pub async fn store_source_archive(
    store: &dyn ArtifactStore,
    submission_id: &str,
    archive: &Path,
) -> Result<String, StorageError> {
    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(crate::workspace::REDACTED_ARCHIVE);
    let locator = store.store(archive, &key(submission_id, name)).await?;
    debug!(submission_id, "Stored sanitized archive at {}", locator);
    Ok(locator)
}

/// Stores the rewritten code, build descriptor, requirements and manifest.
pub async fn store_rewrite(
    store: &dyn ArtifactStore,
    submission_id: &str,
    primary_file: &str,
    result: &RewriteResult,
    report: &AnalysisReport,
    locations: &mut ArtifactLocations,
) -> Result<(), super::PipelineError> {
    let manifest = effective_manifest(result, primary_file);
    let document = serde_json::to_vec_pretty(&RefactorManifest::new(result, &manifest, report))?;
    let requirements = requirements_txt(&report.frameworks);

    locations.rewritten_code = Some(
        store
            .store_bytes(result.rewritten_code.as_bytes(), &key(submission_id, primary_file))
            .await?,
    );
    locations.build_manifest = Some(
        store
            .store_bytes(manifest.as_bytes(), &key(submission_id, DOCKERFILE))
            .await?,
    );
    locations.requirements = Some(
        store
            .store_bytes(requirements.as_bytes(), &key(submission_id, REQUIREMENTS_FILE))
            .await?,
    );
    locations.refactor_manifest = Some(
        store
            .store_bytes(&document, &key(submission_id, MANIFEST_FILE))
            .await?,
    );

    info!(submission_id, "Stored refactored package");
    Ok(())
}
