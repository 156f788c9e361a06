use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle of one verification build
///
/// `QUEUED -> WORKING -> {SUCCESS | FAILURE | TIMEOUT | CANCELLED}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Queued,
    Working,
    Success,
    Failure,
    Timeout,
    Cancelled,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BuildStatus::Queued | BuildStatus::Working)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Queued => "QUEUED",
            BuildStatus::Working => "WORKING",
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::Timeout => "TIMEOUT",
            BuildStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStatus {
    type Err = BuildError;

    /// Accepts the build system's own status names, folding the extra ones
    /// onto the six states tracked here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" | "PENDING" | "STATUS_UNKNOWN" => Ok(BuildStatus::Queued),
            "WORKING" => Ok(BuildStatus::Working),
            "SUCCESS" => Ok(BuildStatus::Success),
            "FAILURE" | "INTERNAL_ERROR" => Ok(BuildStatus::Failure),
            "TIMEOUT" | "EXPIRED" => Ok(BuildStatus::Timeout),
            "CANCELLED" => Ok(BuildStatus::Cancelled),
            other => Err(BuildError::Backend {
                message: format!("Unknown build status: {}", other),
            }),
        }
    }
}

/// Latest known state of a verification build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub build_id: String,
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

impl VerificationOutcome {
    pub fn new(build_id: impl Into<String>, status: BuildStatus) -> Self {
        Self {
            build_id: build_id.into(),
            status,
            logs: None,
        }
    }

    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = Some(logs.into());
        self
    }

    pub fn succeeded(&self) -> bool {
        self.status == BuildStatus::Success
    }
}

/// Which build backend the verifier should try to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Simulated,
    Cloud,
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" | "simulate" => Ok(BuildMode::Simulated),
            "cloud" => Ok(BuildMode::Cloud),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Build not found: {0}")]
    NotFound(String),

    #[error("Build backend error: {message}")]
    Backend { message: String },

    #[error("Build backend unreachable: {message}")]
    Network { message: String },

    #[error("Build configuration error: {0}")]
    Configuration(String),
}
