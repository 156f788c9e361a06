use super::artifacts::{
    effective_manifest, key, requirements_txt, store_rewrite, store_source_archive,
    ArtifactLocations, DOCKERFILE, REQUIREMENTS_FILE,
};
use super::audit::Auditor;
use super::config::{PipelineConfig, VerificationPolicy};
use super::error::{AttemptError, PipelineError, PipelineFailure};
use super::locate::locate_primary_source;
use super::report::AnalysisReport;
use super::retry_context::{FailureContext, RewriteContext};
use super::rewrite::{Refactorer, RewriteResult};
use super::state::{PipelinePhase, PipelineState};
use crate::build::{BuildError, BuildStatus, BuildVerifier, VerificationOutcome};
use crate::llm::{GenerativeClient, TaskKind};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::sanitize::{RedactionStats, Redactor};
use crate::storage::ArtifactStore;
use crate::workspace::{SubmissionId, Workspace};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const BUILD_CONTEXT_ARCHIVE: &str = "build-context.tar.gz";

/// Result of a completed submission
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub submission_id: String,
    pub primary_file: String,
    pub issues_found: usize,
    pub changes_made: usize,
    /// 1-indexed iteration whose rewrite was accepted
    pub iteration: u32,
    pub build_id: Option<String>,
    pub build_status: Option<BuildStatus>,
    pub report: AnalysisReport,
    pub rewrite: RewriteResult,
    pub redaction: RedactionStats,
    pub artifacts: ArtifactLocations,
    pub state: PipelineState,
}

/// The primary source file of a submission
struct PrimarySource {
    relative: PathBuf,
    file_name: String,
    code: String,
}

/// A rewrite that passed validation and the verification policy
struct Accepted {
    rewrite: RewriteResult,
    verification: Option<VerificationOutcome>,
}

/// Drives sanitize, analysis, the self-healing rewrite loop and verification
/// for one submission at a time
///
/// Collaborators are injected; the orchestrator holds no per-submission
/// state, so one instance can serve concurrent submissions.
pub struct SelfHealingOrchestrator {
    auditor: Auditor,
    refactorer: Refactorer,
    verifier: BuildVerifier,
    store: Arc<dyn ArtifactStore>,
    redactor: Redactor,
    config: PipelineConfig,
    work_root: PathBuf,
    progress: Arc<dyn ProgressHandler>,
}

impl SelfHealingOrchestrator {
    pub fn new(
        client: GenerativeClient,
        verifier: BuildVerifier,
        store: Arc<dyn ArtifactStore>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            auditor: Auditor::new(client.clone()),
            refactorer: Refactorer::new(client),
            verifier,
            store,
            redactor: Redactor::new(),
            config: PipelineConfig::default(),
            work_root: work_root.into(),
            progress: Arc::new(NoOpHandler),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress_handler(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = handler;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn emit(&self, event: ProgressEvent) {
        self.progress.on_progress(&event);
    }

    fn enter(&self, state: &mut PipelineState, phase: PipelinePhase) {
        if state.advance(phase) {
            self.emit(ProgressEvent::PhaseStarted { phase });
        } else {
            debug!("Ignoring transition {} -> {}", state.phase, phase);
        }
    }

    /// Runs a new submission for `upload` under a generated id.
    pub async fn run(&self, upload: &Path) -> Result<PipelineOutcome, PipelineFailure> {
        self.run_submission(upload, SubmissionId::generate()).await
    }

    /// Runs the full pipeline for `upload`.
    ///
    /// The submission's workspace is removed before this returns, whatever
    /// the outcome.
    pub async fn run_submission(
        &self,
        upload: &Path,
        submission_id: SubmissionId,
    ) -> Result<PipelineOutcome, PipelineFailure> {
        let start = Instant::now();
        let mut state = PipelineState::new();
        info!(submission_id = %submission_id, "Starting modernization of {}", upload.display());
        self.emit(ProgressEvent::Started {
            submission_id: submission_id.to_string(),
        });

        match self.execute(upload, &submission_id, &mut state).await {
            Ok(mut outcome) => {
                self.enter(&mut state, PipelinePhase::Completed);
                outcome.state = state;
                info!(
                    submission_id = %submission_id,
                    iteration = outcome.iteration,
                    "Modernization complete"
                );
                self.emit(ProgressEvent::Completed {
                    iterations: outcome.iteration,
                    total_time: start.elapsed(),
                });
                Ok(outcome)
            }
            Err(source) => {
                let phase = state.phase;
                let failure =
                    PipelineFailure::new(submission_id.as_str(), phase, state.iteration, source);
                state.fail(failure.diagnostic.clone());
                warn!(
                    submission_id = %submission_id,
                    phase = %phase,
                    iteration = failure.iteration,
                    "Modernization failed: {}",
                    failure.diagnostic
                );
                self.emit(ProgressEvent::Failed {
                    phase,
                    error: failure.diagnostic.clone(),
                });
                Err(failure)
            }
        }
    }

    async fn execute(
        &self,
        upload: &Path,
        submission_id: &SubmissionId,
        state: &mut PipelineState,
    ) -> Result<PipelineOutcome, PipelineError> {
        let id = submission_id.as_str();
        let workspace = Workspace::create(&self.work_root, submission_id.clone())?;

        let phase_start = Instant::now();
        workspace.materialize(upload)?;
        self.enter(state, PipelinePhase::Uploaded);

        let redaction = self.redactor.sanitize(workspace.source_root())?;
        self.emit(ProgressEvent::SanitizeComplete {
            files_removed: redaction.files_removed,
            files_modified: redaction.files_modified,
            issues: redaction.issues.len(),
        });

        // Nothing leaves the workspace until the upload is known to be usable.
        let primary = read_primary(workspace.source_root()).await?;
        info!(submission_id = id, "Primary source file: {}", primary.relative.display());

        let archive = workspace.package()?;
        let mut artifacts = ArtifactLocations {
            source_archive: store_source_archive(self.store.as_ref(), id, &archive).await?,
            ..ArtifactLocations::default()
        };
        self.emit(ProgressEvent::PhaseComplete {
            phase: PipelinePhase::Uploaded,
            duration: phase_start.elapsed(),
        });

        self.enter(state, PipelinePhase::Auditing);
        let phase_start = Instant::now();
        self.emit(ProgressEvent::GenerationStarted {
            task: TaskKind::Analysis,
            iteration: 0,
        });
        let report = self.auditor.analyze(&primary.file_name, &primary.code).await;
        self.emit(ProgressEvent::GenerationComplete {
            task: TaskKind::Analysis,
            iteration: 0,
            response_time: phase_start.elapsed(),
        });
        self.emit(ProgressEvent::PhaseComplete {
            phase: PipelinePhase::Auditing,
            duration: phase_start.elapsed(),
        });

        self.enter(state, PipelinePhase::Refactoring);
        let (accepted, iteration) = self
            .self_heal(&workspace, &primary, &report, state)
            .await?;

        store_rewrite(
            self.store.as_ref(),
            id,
            &primary.file_name,
            &accepted.rewrite,
            &report,
            &mut artifacts,
        )
        .await?;

        Ok(PipelineOutcome {
            submission_id: id.to_string(),
            primary_file: primary.file_name,
            issues_found: report.issue_count(),
            changes_made: accepted.rewrite.changes.len(),
            iteration,
            build_id: accepted.verification.as_ref().map(|v| v.build_id.clone()),
            build_status: accepted.verification.as_ref().map(|v| v.status),
            report,
            rewrite: accepted.rewrite,
            redaction,
            artifacts,
            state: state.clone(),
        })
    }

    /// The bounded rewrite/verify loop. Each failed iteration is folded into
    /// the next one's prompt.
    async fn self_heal(
        &self,
        workspace: &Workspace,
        primary: &PrimarySource,
        report: &AnalysisReport,
        state: &mut PipelineState,
    ) -> Result<(Accepted, u32), PipelineError> {
        let max_iterations = self.config.max_iterations;
        let mut failure: Option<FailureContext> = None;

        for iteration in 1..=max_iterations {
            state.iteration = iteration;
            if state.phase == PipelinePhase::Validating {
                self.enter(state, PipelinePhase::Refactoring);
            }

            let context = match &failure {
                None => RewriteContext::initial(report, max_iterations),
                Some(previous) => RewriteContext::retry(report, iteration, max_iterations, previous),
            };
            info!(
                submission_id = %workspace.submission_id(),
                iteration,
                "Refactoring attempt {}/{}",
                iteration,
                max_iterations
            );

            match self.attempt(workspace, primary, &context, state).await {
                Ok(accepted) => return Ok((accepted, iteration)),
                Err((error, attempted_code)) => {
                    warn!(iteration, "Attempt {} failed: {}", iteration, error);
                    let captured = FailureContext::capture(
                        iteration,
                        &error,
                        attempted_code.as_deref(),
                        self.config.retry_code_chars,
                        self.config.retry_log_chars,
                    );
                    self.emit(ProgressEvent::IterationFailed {
                        iteration,
                        reason: captured.reason.clone(),
                    });
                    failure = Some(captured);
                }
            }
        }

        Err(PipelineError::RefactorExhausted {
            attempts: max_iterations,
            last_failure: failure.map(|f| f.reason).unwrap_or_default(),
        })
    }

    /// One rewrite plus verification. On failure, returns the reason and the
    /// code that was attempted, if any.
    async fn attempt(
        &self,
        workspace: &Workspace,
        primary: &PrimarySource,
        context: &RewriteContext<'_>,
        state: &mut PipelineState,
    ) -> Result<Accepted, (AttemptError, Option<String>)> {
        let iteration = context.iteration;
        let started = Instant::now();
        self.emit(ProgressEvent::GenerationStarted {
            task: TaskKind::Rewrite,
            iteration,
        });
        let rewrite = self
            .refactorer
            .rewrite(&primary.file_name, &primary.code, context)
            .await
            .map_err(|e| (e, None))?;
        self.emit(ProgressEvent::GenerationComplete {
            task: TaskKind::Rewrite,
            iteration,
            response_time: started.elapsed(),
        });

        self.enter(state, PipelinePhase::Validating);
        match self
            .verify(workspace, primary, &rewrite, context.report, iteration)
            .await
        {
            Ok(verification) => Ok(Accepted {
                rewrite,
                verification,
            }),
            Err(e) => Err((e, Some(rewrite.rewritten_code))),
        }
    }

    /// Triggers a verification build and applies the verification policy.
    async fn verify(
        &self,
        workspace: &Workspace,
        primary: &PrimarySource,
        rewrite: &RewriteResult,
        report: &AnalysisReport,
        iteration: u32,
    ) -> Result<Option<VerificationOutcome>, AttemptError> {
        let policy = self.config.verification_policy;
        let artifact_ref = match self
            .stage_build_context(workspace, primary, rewrite, report)
            .await
        {
            Ok(locator) => locator,
            Err(e) if policy == VerificationPolicy::Advisory => {
                warn!(iteration, "Could not stage build context, skipping verification: {}", e);
                return Ok(None);
            }
            Err(e) => {
                return Err(AttemptError::Verification(BuildError::Backend {
                    message: e.to_string(),
                }))
            }
        };

        let triggered = match self.verifier.trigger(&artifact_ref).await {
            Ok(outcome) => outcome,
            Err(e) if policy == VerificationPolicy::Advisory => {
                warn!(iteration, "Verification build trigger failed (non-critical): {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        self.emit(ProgressEvent::VerificationTriggered {
            iteration,
            build_id: triggered.build_id.clone(),
        });

        if policy == VerificationPolicy::Advisory {
            return Ok(Some(triggered));
        }

        let finished = self.verifier.wait_for_completion(&triggered.build_id).await?;
        self.emit(ProgressEvent::VerificationComplete {
            iteration,
            build_id: finished.build_id.clone(),
            status: finished.status,
        });

        if finished.succeeded() {
            Ok(Some(finished))
        } else {
            Err(AttemptError::BuildFailed {
                build_id: finished.build_id,
                status: finished.status,
                logs: finished.logs.unwrap_or_default(),
            })
        }
    }

    /// Packs the sanitized tree with the rewrite applied and stores it as the
    /// submission's build context.
    async fn stage_build_context(
        &self,
        workspace: &Workspace,
        primary: &PrimarySource,
        rewrite: &RewriteResult,
        report: &AnalysisReport,
    ) -> Result<String, PipelineError> {
        let manifest = effective_manifest(rewrite, &primary.file_name);
        let requirements = requirements_txt(&report.frameworks);
        let overlay: [(&Path, &[u8]); 3] = [
            (primary.relative.as_path(), rewrite.rewritten_code.as_bytes()),
            (Path::new(DOCKERFILE), manifest.as_bytes()),
            (Path::new(REQUIREMENTS_FILE), requirements.as_bytes()),
        ];
        let archive = workspace.package_with_overlay(BUILD_CONTEXT_ARCHIVE, &overlay)?;
        let locator = self
            .store
            .store(
                &archive,
                &key(workspace.submission_id().as_str(), BUILD_CONTEXT_ARCHIVE),
            )
            .await?;
        Ok(locator)
    }
}

impl std::fmt::Debug for SelfHealingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfHealingOrchestrator")
            .field("auditor", &self.auditor)
            .field("verifier", &self.verifier)
            .field("config", &self.config)
            .field("work_root", &self.work_root)
            .finish()
    }
}

async fn read_primary(source_root: &Path) -> Result<PrimarySource, PipelineError> {
    let path = locate_primary_source(source_root)
        .ok_or_else(|| PipelineError::NoSourceFound(source_root.to_path_buf()))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| PipelineError::Read {
            path: path.clone(),
            source,
        })?;

    let relative = path
        .strip_prefix(source_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.clone());
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative.display().to_string());

    Ok(PrimarySource {
        relative,
        file_name,
        code: String::from_utf8_lossy(&bytes).into_owned(),
    })
}
