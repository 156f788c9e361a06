use crate::config::RetrofitConfig;
use std::str::FromStr;

/// How a triggered verification build affects acceptance of a rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationPolicy {
    /// Accept the first structurally valid rewrite once its build has been
    /// triggered; the build result is not awaited.
    #[default]
    Advisory,
    /// Wait for the build; any terminal status other than SUCCESS fails the
    /// iteration and its logs feed the next attempt.
    AwaitSuccess,
}

impl FromStr for VerificationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "advisory" => Ok(VerificationPolicy::Advisory),
            "await" | "await_success" | "await-success" => Ok(VerificationPolicy::AwaitSuccess),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_iterations: u32,
    pub verification_policy: VerificationPolicy,
    /// Characters of the previous attempt's code included in a retry prompt
    pub retry_code_chars: usize,
    /// Characters of the failure log included in a retry prompt
    pub retry_log_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            verification_policy: VerificationPolicy::Advisory,
            retry_code_chars: 2000,
            retry_log_chars: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline settings from validated application configuration
    pub fn from_config(config: &RetrofitConfig) -> Self {
        Self::default()
            .with_max_iterations(config.max_iterations)
            .with_verification_policy(config.verification_policy().unwrap_or_default())
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_verification_policy(mut self, policy: VerificationPolicy) -> Self {
        self.verification_policy = policy;
        self
    }

    pub fn with_retry_limits(mut self, code_chars: usize, log_chars: usize) -> Self {
        self.retry_code_chars = code_chars;
        self.retry_log_chars = log_chars;
        self
    }
}
