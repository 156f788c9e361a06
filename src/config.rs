//! Configuration management for retrofit
//!
//! Settings are loaded from environment variables with sensible defaults.
//! They cover generative backend selection, retry and backoff tuning, the
//! self-healing iteration budget, build verification and on-disk locations.
//!
//! # Environment Variables
//!
//! ## Generative backends (first available wins)
//! - `RETROFIT_LOCAL_ENDPOINT` / `OLLAMA_HOST`: local model server endpoint
//! - `RETROFIT_LOCAL_MODEL`: local model name - default: "qwen2.5-coder:7b"
//! - `RETROFIT_API_KEY` / `GEMINI_API_KEY` / `GOOGLE_API_KEY`: cloud account key
//! - `GOOGLE_APPLICATION_CREDENTIALS`: service-account credential file
//! - `RETROFIT_MODEL`: cloud model name - default: "gemini-1.5-pro"
//! - `GCP_PROJECT_ID`, `GCP_REGION`: cloud project and region - default region: "us-central1"
//!
//! ## Generation tuning
//! - `RETROFIT_TEMPERATURE` - default: "0.2"
//! - `RETROFIT_MAX_OUTPUT_TOKENS` - default: "4096"
//! - `RETROFIT_REQUEST_TIMEOUT`: seconds - default: "60"
//! - `RETROFIT_MAX_RETRIES`: extra attempts for cloud backends - default: "2"
//! - `RETROFIT_BACKOFF_UNIT_MS`: backoff time unit - default: "1000"
//!
//! ## Pipeline
//! - `RETROFIT_MAX_ITERATIONS`: self-healing budget - default: "3"
//! - `RETROFIT_VERIFY_POLICY`: `advisory` | `await` - default: "advisory"
//! - `RETROFIT_BUILD_BACKEND`: `simulated` | `cloud` - default: "simulated"
//! - `RETROFIT_WORK_DIR`: per-submission workspace root - default: system temp dir
//! - `RETROFIT_STORAGE_DIR`: durable artifact store - default: temp dir + "retrofit-artifacts"
//! - `RETROFIT_LOG_LEVEL` - default: "info"

use crate::build::BuildMode;
use crate::pipeline::VerificationPolicy;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LOCAL_MODEL: &str = "qwen2.5-coder:7b";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_REGION: &str = "us-central1";
const DEFAULT_TEMPERATURE: f64 = 0.2;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;
const DEFAULT_MAX_ITERATIONS: u32 = 3;
const DEFAULT_VERIFY_POLICY: &str = "advisory";
const DEFAULT_BUILD_BACKEND: &str = "simulated";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid verification policy: {0}. Valid options: advisory, await")]
    InvalidPolicy(String),

    #[error("Invalid build backend: {0}. Valid options: simulated, cloud")]
    InvalidBuildBackend(String),
}

/// Main configuration structure for retrofit
///
/// `Default::default()` loads from environment variables with fallback
/// defaults; construct the struct directly in tests.
#[derive(Clone)]
pub struct RetrofitConfig {
    pub local_endpoint: Option<String>,
    pub local_model: String,
    pub api_key: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub model: String,
    pub project_id: Option<String>,
    pub region: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_unit_ms: u64,
    pub max_iterations: u32,
    /// Raw policy name, resolved by [`RetrofitConfig::verification_policy`]
    pub verify_policy: String,
    /// Raw backend name, resolved by [`RetrofitConfig::build_mode`]
    pub build_backend: String,
    pub work_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub log_level: String,
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for RetrofitConfig {
    fn default() -> Self {
        let local_endpoint =
            env_nonempty("RETROFIT_LOCAL_ENDPOINT").or_else(|| env_nonempty("OLLAMA_HOST"));

        let api_key = env_nonempty("RETROFIT_API_KEY")
            .or_else(|| env_nonempty("GEMINI_API_KEY"))
            .or_else(|| env_nonempty("GOOGLE_API_KEY"));

        let work_dir = env_nonempty("RETROFIT_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let storage_dir = env_nonempty("RETROFIT_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("retrofit-artifacts"));

        Self {
            local_endpoint,
            local_model: env_nonempty("RETROFIT_LOCAL_MODEL")
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            api_key,
            credentials_path: env_nonempty("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            model: env_nonempty("RETROFIT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            project_id: env_nonempty("GCP_PROJECT_ID"),
            region: env_nonempty("GCP_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            temperature: env_parsed("RETROFIT_TEMPERATURE", DEFAULT_TEMPERATURE),
            max_output_tokens: env_parsed("RETROFIT_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS),
            request_timeout_secs: env_parsed(
                "RETROFIT_REQUEST_TIMEOUT",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            max_retries: env_parsed("RETROFIT_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            backoff_unit_ms: env_parsed("RETROFIT_BACKOFF_UNIT_MS", DEFAULT_BACKOFF_UNIT_MS),
            max_iterations: env_parsed("RETROFIT_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS),
            verify_policy: env_nonempty("RETROFIT_VERIFY_POLICY")
                .unwrap_or_else(|| DEFAULT_VERIFY_POLICY.to_string())
                .to_lowercase(),
            build_backend: env_nonempty("RETROFIT_BUILD_BACKEND")
                .unwrap_or_else(|| DEFAULT_BUILD_BACKEND.to_string())
                .to_lowercase(),
            work_dir,
            storage_dir,
            log_level: env_nonempty("RETROFIT_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

impl RetrofitConfig {
    /// Validates ranges and names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max iterations must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        self.verification_policy()?;
        self.build_mode()?;

        Ok(())
    }

    pub fn verification_policy(&self) -> Result<VerificationPolicy, ConfigError> {
        self.verify_policy
            .parse()
            .map_err(|_| ConfigError::InvalidPolicy(self.verify_policy.clone()))
    }

    pub fn build_mode(&self) -> Result<BuildMode, ConfigError> {
        self.build_backend
            .parse()
            .map_err(|_| ConfigError::InvalidBuildBackend(self.build_backend.clone()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// Configuration as key/value pairs, with credentials masked
    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        if let Some(ref endpoint) = self.local_endpoint {
            map.insert("local_endpoint".to_string(), endpoint.clone());
        }
        map.insert("local_model".to_string(), self.local_model.clone());
        map.insert(
            "api_key".to_string(),
            if self.api_key.is_some() { "set" } else { "unset" }.to_string(),
        );
        if let Some(ref path) = self.credentials_path {
            map.insert("credentials_path".to_string(), path.display().to_string());
        }
        map.insert("model".to_string(), self.model.clone());
        if let Some(ref project) = self.project_id {
            map.insert("project_id".to_string(), project.clone());
        }
        map.insert("region".to_string(), self.region.clone());
        map.insert("temperature".to_string(), self.temperature.to_string());
        map.insert(
            "max_output_tokens".to_string(),
            self.max_output_tokens.to_string(),
        );
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        map.insert("max_retries".to_string(), self.max_retries.to_string());
        map.insert(
            "backoff_unit_ms".to_string(),
            self.backoff_unit_ms.to_string(),
        );
        map.insert(
            "max_iterations".to_string(),
            self.max_iterations.to_string(),
        );
        map.insert("verify_policy".to_string(), self.verify_policy.clone());
        map.insert("build_backend".to_string(), self.build_backend.clone());
        map.insert("work_dir".to_string(), self.work_dir.display().to_string());
        map.insert(
            "storage_dir".to_string(),
            self.storage_dir.display().to_string(),
        );
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Debug for RetrofitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrofitConfig")
            .field("local_endpoint", &self.local_endpoint)
            .field("local_model", &self.local_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("credentials_path", &self.credentials_path)
            .field("model", &self.model)
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .field("max_retries", &self.max_retries)
            .field("max_iterations", &self.max_iterations)
            .field("verify_policy", &self.verify_policy)
            .field("build_backend", &self.build_backend)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RetrofitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Retrofit Configuration:")?;
        writeln!(
            f,
            "  Local Endpoint: {}",
            self.local_endpoint.as_deref().unwrap_or("(none)")
        )?;
        writeln!(f, "  Local Model: {}", self.local_model)?;
        writeln!(
            f,
            "  API Key: {}",
            if self.api_key.is_some() { "set" } else { "unset" }
        )?;
        if let Some(ref path) = self.credentials_path {
            writeln!(f, "  Credentials: {}", path.display())?;
        }
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(
            f,
            "  Retries: {} (backoff unit {}ms)",
            self.max_retries, self.backoff_unit_ms
        )?;
        writeln!(f, "  Max Iterations: {}", self.max_iterations)?;
        writeln!(f, "  Verify Policy: {}", self.verify_policy)?;
        writeln!(f, "  Build Backend: {}", self.build_backend)?;
        writeln!(f, "  Storage Dir: {}", self.storage_dir.display())?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
