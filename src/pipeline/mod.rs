//! Self-healing modernization pipeline
//!
//! [`SelfHealingOrchestrator`] runs one submission through
//! `PENDING -> UPLOADED -> AUDITING -> REFACTORING <-> VALIDATING -> COMPLETED`:
//! the upload is sanitized, its primary file analysed, and a rewrite requested
//! until one passes validation and the configured [`VerificationPolicy`], or
//! the iteration budget runs out.

pub mod artifacts;
mod audit;
mod config;
mod error;
mod locate;
mod orchestrator;
mod report;
mod retry_context;
mod rewrite;
mod state;

pub use artifacts::{requirements_txt, ArtifactLocations, RefactorManifest, MANIFEST_FILE};
pub use audit::{analysis_prompt, Auditor};
pub use config::{PipelineConfig, VerificationPolicy};
pub use error::{AttemptError, PipelineError, PipelineFailure};
pub use locate::{locate_primary_source, ENTRY_POINTS};
pub use orchestrator::{PipelineOutcome, SelfHealingOrchestrator};
pub use report::{
    ActionPlan, AnalysisReport, Issue, PlanStep, Severity, ANALYSIS_REQUIRED_KEYS,
    NO_RECOMMENDATION,
};
pub use retry_context::{FailureContext, RewriteContext};
pub use rewrite::{rewrite_prompt, Refactorer, RewriteResult, REWRITE_REQUIRED_KEYS};
pub use state::{PipelinePhase, PipelineState};
