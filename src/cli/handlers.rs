//! Command handlers
//!
//! Each handler returns the process exit code; failures are logged rather
//! than propagated.

use super::commands::{HealthArgs, RunArgs, SanitizeArgs};
use super::output::{ComponentHealth, HealthReport, OutputFormatter};
use crate::build::BuildVerifier;
use crate::config::RetrofitConfig;
use crate::llm::{
    candidate_strategies, select_backend, BackendKind, GenerativeClient, LazyBackend,
    OllamaBackend,
};
use crate::pipeline::{PipelineConfig, SelfHealingOrchestrator};
use crate::progress::LoggingHandler;
use crate::sanitize::Redactor;
use crate::storage::LocalStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Applies `run` flags on top of the environment configuration.
pub fn run_config(args: &RunArgs, base: RetrofitConfig) -> Result<RetrofitConfig> {
    let mut config = base;

    if let Some(max_iterations) = args.max_iterations {
        debug!("Iteration budget overridden to: {}", max_iterations);
        config.max_iterations = max_iterations;
    }
    if let Some(ref policy) = args.verify {
        debug!("Verification policy overridden to: {}", policy);
        config.verify_policy = policy.to_lowercase();
    }
    if let Some(ref dir) = args.storage_dir {
        config.storage_dir = dir.clone();
    }
    if args.simulate {
        debug!("Simulation forced; ignoring configured backends");
        config.local_endpoint = None;
        config.api_key = None;
        config.credentials_path = None;
        config.build_backend = "simulated".to_string();
    }

    config.validate().context("Configuration error")?;
    Ok(config)
}

pub async fn handle_run(args: &RunArgs) -> i32 {
    info!("Starting modernization run");

    if !args.upload.exists() {
        error!("Upload does not exist: {}", args.upload.display());
        return 1;
    }

    let config = match run_config(args, RetrofitConfig::default()) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("\nPlease check your environment variables and command-line arguments.");
            return 1;
        }
    };

    match run_pipeline(args, config).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

async fn run_pipeline(args: &RunArgs, config: RetrofitConfig) -> Result<String> {
    let pipeline_config =
        PipelineConfig::from_config(&config).with_verification_policy(config.verification_policy()?);

    let client = GenerativeClient::new(Arc::new(LazyBackend::new(config.clone())))
        .with_retry_policy(config.max_retries, config.backoff_unit());
    let verifier = BuildVerifier::from_config(&config).await;
    debug!("Build verification backend: {}", verifier.backend_name());

    let store = Arc::new(LocalStore::new(config.storage_dir.clone()));
    let orchestrator =
        SelfHealingOrchestrator::new(client, verifier, store, config.work_dir.clone())
            .with_config(pipeline_config)
            .with_progress_handler(Arc::new(LoggingHandler));

    let outcome = orchestrator.run(&args.upload).await?;
    OutputFormatter::new(args.format.into()).format_outcome(&outcome)
}

pub async fn handle_sanitize(args: &SanitizeArgs) -> i32 {
    info!("Sanitizing {}", args.path.display());

    if !args.path.is_dir() {
        error!("Path is not a directory: {}", args.path.display());
        return 1;
    }

    let stats = match Redactor::new().sanitize(&args.path) {
        Ok(stats) => stats,
        Err(e) => {
            error!("Sanitize failed: {}", e);
            return 1;
        }
    };

    match OutputFormatter::new(args.format.into()).format_sanitize(&stats) {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            1
        }
    }
}

pub async fn handle_health(args: &HealthArgs) -> i32 {
    info!("Checking backend health");

    let config = RetrofitConfig::default();
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return 1;
    }

    let report = health_report(&config).await;

    match OutputFormatter::new(args.format.into()).format_health(&report) {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            1
        }
    }
}

/// Which generative strategy would serve requests and how builds are verified
pub async fn health_report(config: &RetrofitConfig) -> HealthReport {
    let candidates: Vec<String> = candidate_strategies(config)
        .into_iter()
        .map(|kind| kind.to_string())
        .collect();

    let selected = select_backend(config);
    let mut generative =
        ComponentHealth::available(selected.kind.to_string(), selected.description.clone());

    if selected.kind == BackendKind::LocalServer {
        if let Some(ref endpoint) = config.local_endpoint {
            let reachable = match OllamaBackend::new(
                endpoint.clone(),
                config.local_model.clone(),
                config.request_timeout(),
            ) {
                Ok(backend) => backend.health_check().await,
                Err(_) => false,
            };
            if !reachable {
                generative = ComponentHealth::unavailable(
                    selected.kind.to_string(),
                    selected.description.clone(),
                )
                .with_details(format!("{} did not answer", endpoint));
            }
        }
    } else if selected.kind == BackendKind::Simulator && candidates.len() > 1 {
        generative = generative.with_details("Configured backends failed to initialize");
    }

    let verifier = BuildVerifier::from_config(config).await;
    let build = if verifier.is_simulated() {
        ComponentHealth::available(verifier.backend_name(), "Builds are simulated")
            .with_details("Set RETROFIT_BUILD_BACKEND=cloud with credentials for real builds")
    } else {
        ComponentHealth::available(verifier.backend_name(), "Builds run on the cloud service")
    };

    HealthReport {
        generative,
        build,
        candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::OutputFormatArg;
    use crate::pipeline::VerificationPolicy;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> RetrofitConfig {
        RetrofitConfig {
            local_endpoint: None,
            local_model: "qwen2.5-coder:7b".to_string(),
            api_key: None,
            credentials_path: None,
            model: "gemini-1.5-pro".to_string(),
            project_id: None,
            region: "us-central1".to_string(),
            temperature: 0.2,
            max_output_tokens: 4096,
            request_timeout_secs: 60,
            max_retries: 2,
            backoff_unit_ms: 1,
            max_iterations: 3,
            verify_policy: "advisory".to_string(),
            build_backend: "simulated".to_string(),
            work_dir: dir.path().join("work"),
            storage_dir: dir.path().join("store"),
            log_level: "info".to_string(),
        }
    }

    fn run_args(upload: PathBuf) -> RunArgs {
        RunArgs {
            upload,
            format: OutputFormatArg::Json,
            max_iterations: None,
            verify: None,
            storage_dir: None,
            simulate: false,
        }
    }

    #[test]
    fn test_run_config_overrides() {
        let dir = TempDir::new().unwrap();
        let mut base = test_config(&dir);
        base.api_key = Some("key".to_string());

        let mut args = run_args(PathBuf::from("app.py"));
        args.max_iterations = Some(5);
        args.verify = Some("AWAIT".to_string());
        args.simulate = true;

        let config = run_config(&args, base).unwrap();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(
            config.verification_policy().unwrap(),
            VerificationPolicy::AwaitSuccess
        );
        assert!(config.api_key.is_none());
        assert_eq!(candidate_strategies(&config), vec![BackendKind::Simulator]);
    }

    #[test]
    fn test_run_config_rejects_invalid_policy() {
        let dir = TempDir::new().unwrap();
        let mut args = run_args(PathBuf::from("app.py"));
        args.verify = Some("sometimes".to_string());

        let err = run_config(&args, test_config(&dir)).unwrap_err();
        assert!(format!("{:#}", err).contains("sometimes"));
    }

    #[tokio::test]
    async fn test_health_report_simulated() {
        let dir = TempDir::new().unwrap();
        let report = health_report(&test_config(&dir)).await;

        assert_eq!(report.generative.name, "simulator");
        assert!(report.generative.available);
        assert_eq!(report.candidates, vec!["simulator".to_string()]);
        assert!(report.build.message.contains("simulated"));
    }

    #[tokio::test]
    async fn test_run_pipeline_simulated() {
        let dir = TempDir::new().unwrap();
        let upload = dir.path().join("app.py");
        std::fs::write(&upload, "import os\nprint('legacy')\n").unwrap();
        let config = test_config(&dir);
        std::fs::create_dir_all(&config.work_dir).unwrap();

        let output = run_pipeline(&run_args(upload), config).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["primary_file"], "app.py");
        assert_eq!(value["iteration"], 1);
        assert_eq!(value["state"]["phase"], "completed");
    }

    #[tokio::test]
    async fn test_handle_sanitize_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "x = 1").unwrap();
        let args = SanitizeArgs {
            path: file,
            format: OutputFormatArg::Human,
        };
        assert_eq!(handle_sanitize(&args).await, 1);
    }
}
