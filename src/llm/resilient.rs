//! Retry and backoff around a selected backend

use super::client::{BackendKind, GenerativeBackend};
use super::error::{BackendError, GenerationError};
use super::types::{Completion, GenerationRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Generative client with bounded retry
///
/// Cloud backends get `max_retries` extra attempts, sleeping
/// `backoff_unit * 2^attempt` between them. Local-server and simulator
/// backends are tried exactly once. Empty text counts as a failure.
#[derive(Clone)]
pub struct GenerativeClient {
    backend: Arc<dyn GenerativeBackend>,
    max_retries: u32,
    backoff_unit: Duration,
}

impl GenerativeClient {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, backoff_unit: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_unit = backoff_unit;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    fn attempt_budget(&self) -> u32 {
        if self.backend.kind().retries() {
            self.max_retries + 1
        } else {
            1
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    pub async fn complete(
        &self,
        request: &GenerationRequest,
    ) -> Result<Completion, GenerationError> {
        let budget = self.attempt_budget();
        let mut last_error = BackendError::Other {
            message: "no attempt made".to_string(),
        };

        for attempt in 0..budget {
            match self.backend.complete(request).await {
                Ok(completion) if !completion.is_empty() => {
                    debug!(
                        "{} answered on attempt {}/{}",
                        self.backend.name(),
                        attempt + 1,
                        budget
                    );
                    return Ok(completion);
                }
                Ok(_) => {
                    last_error = BackendError::InvalidResponse {
                        message: "Empty response".to_string(),
                        raw_response: None,
                    };
                }
                Err(e) => last_error = e,
            }

            warn!(
                "{} attempt {}/{} failed: {}",
                self.backend.name(),
                attempt + 1,
                budget,
                last_error
            );

            if attempt + 1 < budget {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        Err(GenerationError::Unavailable {
            backend: self.backend.name().to_string(),
            attempts: budget,
            source: last_error,
        })
    }
}

impl std::fmt::Debug for GenerativeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeClient")
            .field("backend", &self.backend.name())
            .field("max_retries", &self.max_retries)
            .field("backoff_unit", &self.backoff_unit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockGenerativeBackend, MockResponse};
    use crate::llm::types::TaskKind;
    use tokio::time::Instant;

    fn request() -> GenerationRequest {
        GenerationRequest::new(TaskKind::Rewrite, "rewrite")
    }

    fn network_error() -> MockResponse {
        MockResponse::error(BackendError::NetworkError {
            message: "reset".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_cloud_backend_exhausts_retries_with_backoff() {
        let mock = Arc::new(MockGenerativeBackend::with_kind(BackendKind::CloudKey));
        mock.add_responses([network_error(), network_error(), network_error()]);

        let client = GenerativeClient::new(mock.clone());
        let start = Instant::now();
        let err = client.complete(&request()).await.unwrap_err();

        assert_eq!(mock.call_count(), 3);
        assert_eq!(err.attempts(), 3);
        assert!(start.elapsed() >= Duration::from_secs(3));
        match err {
            GenerationError::Unavailable { source, .. } => {
                assert!(matches!(source, BackendError::NetworkError { .. }))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_is_retried() {
        let mock = Arc::new(MockGenerativeBackend::with_kind(BackendKind::CloudCredential));
        mock.add_responses([MockResponse::text("   "), MockResponse::text("{\"ok\": true}")]);

        let client = GenerativeClient::new(mock.clone());
        let out = client.complete(&request()).await.unwrap();

        assert_eq!(out.as_text(), Some("{\"ok\": true}"));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_server_fails_immediately() {
        let mock = Arc::new(MockGenerativeBackend::with_kind(BackendKind::LocalServer));
        mock.add_responses([network_error(), MockResponse::text("never reached")]);

        let client = GenerativeClient::new(mock.clone());
        let start = Instant::now();
        let err = client.complete(&request()).await.unwrap_err();

        assert_eq!(err.attempts(), 1);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_retry_policy() {
        let mock = Arc::new(MockGenerativeBackend::with_kind(BackendKind::CloudKey));
        mock.add_responses([network_error(), network_error()]);

        let client =
            GenerativeClient::new(mock.clone()).with_retry_policy(1, Duration::from_millis(10));
        let start = Instant::now();
        let err = client.complete(&request()).await.unwrap_err();

        assert_eq!(err.attempts(), 2);
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert!(start.elapsed() < Duration::from_millis(30));
    }

    #[test]
    fn test_backoff_doubles() {
        let client = GenerativeClient::new(Arc::new(MockGenerativeBackend::new()));
        assert_eq!(client.backoff(0), Duration::from_secs(1));
        assert_eq!(client.backoff(1), Duration::from_secs(2));
        assert_eq!(client.backoff(2), Duration::from_secs(4));
    }
}
