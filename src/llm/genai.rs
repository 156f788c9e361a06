//! Cloud model backend authenticated with an account key
//!
//! Uses the `genai` crate against the Gemini adapter. The key is injected
//! through a service-target resolver so the process environment is never
//! consulted after configuration has been loaded.

use super::client::{BackendKind, GenerativeBackend};
use super::error::BackendError;
use super::types::{Completion, GenerationRequest, ResponseFormat};
use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatResponseFormat};
use genai::resolver::{AuthData, ServiceTargetResolver};
use genai::{Client, ServiceTarget};
use std::time::Duration;
use tracing::{debug, error};

pub struct GenAiBackend {
    client: Client,
    model: String,
    timeout: Duration,
    temperature: f64,
    max_output_tokens: u32,
}

impl GenAiBackend {
    /// Creates a key-authenticated client for `model`.
    ///
    /// Fails with [`BackendError::ConfigurationError`] on an empty key, which
    /// demotes selection to the next strategy.
    pub fn new(
        api_key: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(BackendError::ConfigurationError {
                message: "API key is empty".to_string(),
            });
        }

        let model = model.into();

        let resolver = ServiceTargetResolver::from_resolver_fn(
            move |service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
                let ServiceTarget {
                    endpoint, model, ..
                } = service_target;
                Ok(ServiceTarget {
                    endpoint,
                    auth: AuthData::from_single(api_key.clone()),
                    model,
                })
            },
        );

        let client = Client::builder()
            .with_service_target_resolver(resolver)
            .build();

        debug!("Creating key-authenticated cloud client: model={}", model);

        Ok(Self {
            client,
            model,
            timeout,
            temperature: 0.2,
            max_output_tokens: 4096,
        })
    }

    pub fn with_generation_params(mut self, temperature: f64, max_output_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }
}

#[async_trait]
impl GenerativeBackend for GenAiBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion, BackendError> {
        let chat = ChatRequest::new(vec![ChatMessage::user(request.prompt.clone())]);

        let mut options = ChatOptions::default()
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_output_tokens);
        if request.response_format == ResponseFormat::Json {
            options = options.with_response_format(ChatResponseFormat::JsonMode);
        }

        let response = match tokio::time::timeout(
            self.timeout,
            self.client.exec_chat(&self.model, chat, Some(&options)),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                error!("Cloud model API error: {}", e);
                return Err(BackendError::ApiError {
                    message: format!("{} request failed: {}", self.model, e),
                    status_code: None,
                });
            }
            Err(_) => {
                error!(
                    "Cloud model request timed out after {}s",
                    self.timeout.as_secs()
                );
                return Err(BackendError::TimeoutError {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let content = response.first_text().unwrap_or_default().to_string();
        Ok(Completion::Text(content))
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::CloudKey
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

impl std::fmt::Debug for GenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAiBackend")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation() {
        let backend =
            GenAiBackend::new("test-key", "gemini-1.5-pro", Duration::from_secs(30)).unwrap();
        assert_eq!(backend.name(), "gemini");
        assert_eq!(backend.kind(), BackendKind::CloudKey);
        assert_eq!(backend.model_info(), Some("gemini-1.5-pro".to_string()));
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = GenAiBackend::new("  ", "gemini-1.5-pro", Duration::from_secs(30));
        assert!(matches!(
            result,
            Err(BackendError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let backend =
            GenAiBackend::new("very-secret", "gemini-1.5-pro", Duration::from_secs(30)).unwrap();
        assert!(!format!("{:?}", backend).contains("very-secret"));
    }
}
