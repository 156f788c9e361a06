use super::client::{BackendKind, GenerativeBackend};
use super::error::BackendError;
use super::selector::{select_backend, SelectedBackend};
use super::types::{Completion, GenerationRequest};
use crate::config::RetrofitConfig;
use async_trait::async_trait;
use std::sync::OnceLock;
use tracing::debug;

/// Defers strategy selection until the backend is first used
///
/// Selection runs at most once; afterwards every call goes straight to the
/// chosen backend without locking.
pub struct LazyBackend {
    selected: OnceLock<SelectedBackend>,
    config: RetrofitConfig,
}

impl LazyBackend {
    pub fn new(config: RetrofitConfig) -> Self {
        debug!("Creating LazyBackend - strategy selection deferred until first use");
        Self {
            selected: OnceLock::new(),
            config,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.selected.get().is_some()
    }

    fn selected(&self) -> &SelectedBackend {
        self.selected.get_or_init(|| {
            debug!("Lazy initialization triggered - selecting generative backend now");
            select_backend(&self.config)
        })
    }

    /// Human-readable description of the chosen strategy
    pub fn description(&self) -> &str {
        &self.selected().description
    }
}

#[async_trait]
impl GenerativeBackend for LazyBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion, BackendError> {
        self.selected().backend.complete(request).await
    }

    fn name(&self) -> &str {
        self.selected().backend.name()
    }

    fn kind(&self) -> BackendKind {
        self.selected().kind
    }

    fn model_info(&self) -> Option<String> {
        self.selected().backend.model_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::TaskKind;

    fn simulator_config() -> RetrofitConfig {
        let mut config = RetrofitConfig::default();
        config.local_endpoint = None;
        config.api_key = None;
        config.credentials_path = None;
        config
    }

    #[tokio::test]
    async fn test_selection_deferred_until_use() {
        let lazy = LazyBackend::new(simulator_config());
        assert!(!lazy.is_initialized());

        let out = lazy
            .complete(&GenerationRequest::new(TaskKind::Analysis, "Filename: a.py"))
            .await
            .unwrap();
        assert!(matches!(out, Completion::Structured(_)));
        assert!(lazy.is_initialized());
        assert_eq!(lazy.kind(), BackendKind::Simulator);
    }

    #[test]
    fn test_description_initializes() {
        let lazy = LazyBackend::new(simulator_config());
        assert_eq!(lazy.description(), "built-in simulator");
        assert!(lazy.is_initialized());
    }
}
