//! retrofit - self-healing modernization of legacy Python code
//!
//! An upload is sanitized of secrets, its primary source file analysed and
//! rewritten by a generative model, and the rewrite verified with a container
//! build. Failed attempts are folded back into the next prompt until one
//! succeeds or the iteration budget runs out.
//!
//! # Core Concepts
//!
//! - **Redaction**: dangerous files are deleted and inline secrets replaced
//!   before anything leaves the machine
//! - **Generative backends**: a priority chain of model strategies behind
//!   [`GenerativeBackend`], wrapped with retry and backoff by
//!   [`GenerativeClient`]
//! - **Structured extraction**: JSON recovery from free-form model output
//! - **Verification**: build triggering and polling through [`BuildVerifier`]
//! - **Self-healing**: [`SelfHealingOrchestrator`] drives the phases and the
//!   retry loop
//!
//! # Example Usage
//!
//! ```ignore
//! use retrofit::{
//!     BuildVerifier, GenerativeClient, LocalStore, SelfHealingOrchestrator, SimulatorBackend,
//! };
//! use std::sync::Arc;
//!
//! async fn modernize(upload: &std::path::Path) -> anyhow::Result<()> {
//!     let client = GenerativeClient::new(Arc::new(SimulatorBackend::new()));
//!     let orchestrator = SelfHealingOrchestrator::new(
//!         client,
//!         BuildVerifier::simulated(),
//!         Arc::new(LocalStore::new("/tmp/retrofit-artifacts")),
//!         std::env::temp_dir(),
//!     );
//!
//!     let outcome = orchestrator.run(upload).await?;
//!     println!("{}", outcome.report);
//!     Ok(())
//! }
//! ```

pub mod build;
pub mod cli;
pub mod config;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod sanitize;
pub mod storage;
pub mod util;
pub mod workspace;

pub use build::{BuildError, BuildStatus, BuildVerifier, VerificationOutcome};
pub use config::{ConfigError, RetrofitConfig};
pub use extract::{ExtractError, StructuredExtractor, StructuredMap};
pub use llm::{
    BackendError, BackendKind, GenerationError, GenerativeBackend, GenerativeClient,
    LazyBackend, SimulatorBackend,
};
pub use pipeline::{
    AnalysisReport, PipelineFailure, PipelineOutcome, RewriteResult, SelfHealingOrchestrator,
};
pub use sanitize::{RedactionStats, Redactor};
pub use storage::{ArtifactStore, LocalStore};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
