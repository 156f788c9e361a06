use super::error::BackendError;
use super::types::{Completion, GenerationRequest};
use async_trait::async_trait;
use std::fmt;

/// Which kind of strategy a backend is
///
/// Determines the retry policy applied by the resilient client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Self-hosted model server reachable on the local network
    LocalServer,
    /// Cloud model API authenticated with an account key
    CloudKey,
    /// Cloud model API authenticated with a service credential
    CloudCredential,
    /// Deterministic built-in simulator
    Simulator,
}

impl BackendKind {
    /// Whether transient failures are retried with backoff
    pub fn retries(self) -> bool {
        matches!(self, BackendKind::CloudKey | BackendKind::CloudCredential)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::LocalServer => "local-server",
            BackendKind::CloudKey => "cloud-key",
            BackendKind::CloudCredential => "cloud-credential",
            BackendKind::Simulator => "simulator",
        };
        f.write_str(name)
    }
}

/// A generative backend strategy exposing a single completion call
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion, BackendError>;

    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    fn model_info(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::TaskKind;

    struct TestBackend;

    #[async_trait]
    impl GenerativeBackend for TestBackend {
        async fn complete(&self, _request: &GenerationRequest) -> Result<Completion, BackendError> {
            Ok(Completion::Text("Test response".to_string()))
        }

        fn name(&self) -> &str {
            "TestBackend"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::LocalServer
        }
    }

    #[tokio::test]
    async fn test_backend_trait() {
        let backend = TestBackend;
        assert_eq!(backend.name(), "TestBackend");
        assert!(backend.model_info().is_none());

        let out = backend
            .complete(&GenerationRequest::new(TaskKind::Analysis, "x"))
            .await
            .unwrap();
        assert_eq!(out.as_text(), Some("Test response"));
    }

    #[test]
    fn test_retry_policy_by_kind() {
        assert!(BackendKind::CloudKey.retries());
        assert!(BackendKind::CloudCredential.retries());
        assert!(!BackendKind::LocalServer.retries());
        assert!(!BackendKind::Simulator.retries());
    }
}
