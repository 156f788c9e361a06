//! Local model server backend (Ollama HTTP API)

use super::client::{BackendKind, GenerativeBackend};
use super::error::BackendError;
use super::types::{Completion, GenerationRequest, ResponseFormat};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Client for a self-hosted Ollama server
///
/// Failures are not retried: a transport error or timeout surfaces
/// immediately to the resilient client.
pub struct OllamaBackend {
    endpoint: String,
    model: String,
    http_client: Client,
    timeout: Duration,
    temperature: f64,
    max_output_tokens: u32,
}

impl OllamaBackend {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            http_client,
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

    /// Lightweight probe of `/api/tags`.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        debug!("Checking local model server at {}", url);

        match self
            .http_client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Local model server not reachable: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl GenerativeBackend for OllamaBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion, BackendError> {
        let url = format!("{}/api/generate", self.endpoint);

        let body = OllamaRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            format: (request.response_format == ResponseFormat::Json).then_some("json"),
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_output_tokens,
            },
        };

        debug!(
            "Sending request to local model server: model={}, prompt_length={}",
            self.model,
            request.prompt.len()
        );

        let start = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Local model server request failed: {}", e);
                BackendError::from_reqwest(&e, self.timeout.as_secs())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 404 && body.contains("model") {
                return Err(BackendError::ConfigurationError {
                    message: format!(
                        "Model '{}' not found. Pull it with: ollama pull {}",
                        self.model, self.model
                    ),
                });
            }

            return Err(BackendError::from_status(status, &body));
        }

        let parsed: OllamaResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    message: format!("JSON parse error: {}", e),
                    raw_response: None,
                })?;

        if !parsed.done {
            warn!("Local model server reports incomplete generation");
        }

        info!(
            "Local generation completed in {:.2}s (model={})",
            start.elapsed().as_secs_f64(),
            self.model
        );

        Ok(Completion::Text(parsed.response))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::LocalServer
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{} @ {}", self.model, self.endpoint))
    }
}

impl fmt::Debug for OllamaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaBackend")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::TaskKind;

    #[test]
    fn test_request_serialization() {
        let body = OllamaRequest {
            model: "qwen2.5-coder:7b",
            prompt: "hello",
            stream: false,
            format: Some("json"),
            options: OllamaOptions {
                temperature: 0.2,
                num_predict: 4096,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 4096);
    }

    #[test]
    fn test_text_format_omits_field() {
        let body = OllamaRequest {
            model: "m",
            prompt: "p",
            stream: false,
            format: None,
            options: OllamaOptions {
                temperature: 0.0,
                num_predict: 1,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("format").is_none());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let backend =
            OllamaBackend::new("http://localhost:11434/", "m", Duration::from_secs(5)).unwrap();
        assert_eq!(
            backend.model_info().as_deref(),
            Some("m @ http://localhost:11434")
        );
        assert_eq!(backend.kind(), BackendKind::LocalServer);
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_immediately() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let backend =
            OllamaBackend::new("http://127.0.0.1:9", "m", Duration::from_secs(2)).unwrap();
        let result = backend
            .complete(&GenerationRequest::new(TaskKind::Analysis, "x"))
            .await;
        assert!(matches!(
            result,
            Err(BackendError::NetworkError { .. }) | Err(BackendError::TimeoutError { .. })
        ));
        assert!(!backend.health_check().await);
    }
}
