//! Backend strategy selection
//!
//! A single priority chain over configuration, evaluated once:
//! local server endpoint, then account key, then service credential, then the
//! built-in simulator. Initialisation failures demote to the next strategy.

use super::client::{BackendKind, GenerativeBackend};
use super::genai::GenAiBackend;
use super::ollama::OllamaBackend;
use super::simulator::SimulatorBackend;
use super::vertex::VertexBackend;
use crate::config::RetrofitConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SelectedBackend {
    pub backend: Arc<dyn GenerativeBackend>,
    pub kind: BackendKind,
    pub description: String,
}

impl std::fmt::Debug for SelectedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedBackend")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish()
    }
}

/// Strategies the configuration makes eligible, in priority order
///
/// The simulator is always last. Eligibility does not guarantee that
/// initialisation will succeed.
pub fn candidate_strategies(config: &RetrofitConfig) -> Vec<BackendKind> {
    let mut candidates = Vec::new();
    if config.local_endpoint.is_some() {
        candidates.push(BackendKind::LocalServer);
    }
    if config.api_key.is_some() {
        candidates.push(BackendKind::CloudKey);
    }
    if config.credentials_path.is_some() {
        candidates.push(BackendKind::CloudCredential);
    }
    candidates.push(BackendKind::Simulator);
    candidates
}

/// Picks the first strategy that initialises without error.
pub fn select_backend(config: &RetrofitConfig) -> SelectedBackend {
    for kind in candidate_strategies(config) {
        let selected = match kind {
            BackendKind::LocalServer => try_local(config),
            BackendKind::CloudKey => try_cloud_key(config),
            BackendKind::CloudCredential => try_cloud_credential(config),
            BackendKind::Simulator => Some(simulator()),
        };

        if let Some(selected) = selected {
            info!("Using generative backend: {}", selected.description);
            return selected;
        }
    }

    simulator()
}

fn try_local(config: &RetrofitConfig) -> Option<SelectedBackend> {
    let endpoint = config.local_endpoint.as_ref()?;

    match OllamaBackend::new(
        endpoint.clone(),
        config.local_model.clone(),
        config.request_timeout(),
    ) {
        Ok(backend) => Some(SelectedBackend {
            backend: Arc::new(
                backend.with_generation_params(config.temperature, config.max_output_tokens),
            ),
            kind: BackendKind::LocalServer,
            description: format!("local server ({} @ {})", config.local_model, endpoint),
        }),
        Err(e) => {
            warn!("Failed to initialize local model server client: {}", e);
            None
        }
    }
}

fn try_cloud_key(config: &RetrofitConfig) -> Option<SelectedBackend> {
    let key = config.api_key.as_ref()?;

    match GenAiBackend::new(key, config.model.clone(), config.request_timeout()) {
        Ok(backend) => Some(SelectedBackend {
            backend: Arc::new(
                backend.with_generation_params(config.temperature, config.max_output_tokens),
            ),
            kind: BackendKind::CloudKey,
            description: format!("cloud API key ({})", config.model),
        }),
        Err(e) => {
            warn!("Failed to initialize key-authenticated client: {}", e);
            None
        }
    }
}

fn try_cloud_credential(config: &RetrofitConfig) -> Option<SelectedBackend> {
    let path = config.credentials_path.as_ref()?;

    match VertexBackend::new(
        path,
        config.project_id.clone(),
        config.region.clone(),
        config.model.clone(),
        config.request_timeout(),
    ) {
        Ok(backend) => Some(SelectedBackend {
            backend: Arc::new(
                backend.with_generation_params(config.temperature, config.max_output_tokens),
            ),
            kind: BackendKind::CloudCredential,
            description: format!("cloud service credential ({})", config.model),
        }),
        Err(e) => {
            warn!("Failed to initialize credential-authenticated client: {}", e);
            None
        }
    }
}

fn simulator() -> SelectedBackend {
    debug!("Falling back to built-in simulator");
    SelectedBackend {
        backend: Arc::new(SimulatorBackend::new()),
        kind: BackendKind::Simulator,
        description: "built-in simulator".to_string(),
    }
}
