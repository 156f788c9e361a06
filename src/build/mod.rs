//! Build verification
//!
//! A [`BuildVerifier`] triggers a container build of the rewritten artifact
//! and polls it through a [`BuildBackend`]: either the Cloud Build REST API
//! or a deterministic simulation.

mod backend;
mod cloud;
mod manifest;
mod simulated;
mod types;
mod verifier;

pub use backend::BuildBackend;
pub use cloud::{parse_gcs_uri, CloudBuildBackend};
pub use manifest::default_manifest;
pub use simulated::{ScriptedBuild, SimulatedBuildBackend};
pub use types::{BuildError, BuildMode, BuildStatus, VerificationOutcome};
pub use verifier::{BuildVerifier, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL};
