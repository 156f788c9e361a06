//! Cloud model backend authenticated with a service-account credential
//!
//! Calls the Vertex AI `generateContent` REST endpoint directly with reqwest,
//! using an access token from [`TokenProvider`].

use super::auth::{ServiceAccountKey, TokenProvider};
use super::client::{BackendKind, GenerativeBackend};
use super::error::BackendError;
use super::types::{Completion, GenerationRequest, ResponseFormat};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};

pub struct VertexBackend {
    http_client: Client,
    tokens: TokenProvider,
    project_id: String,
    region: String,
    model: String,
    timeout: Duration,
    temperature: f64,
    max_output_tokens: u32,
}

impl VertexBackend {
    /// Loads the credential file and resolves the project.
    ///
    /// `project_id` overrides the project recorded in the key file; with
    /// neither present construction fails.
    pub fn new(
        credentials_path: &Path,
        project_id: Option<String>,
        region: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let key = ServiceAccountKey::load(credentials_path)?;

        let project_id = project_id
            .or_else(|| key.project_id.clone())
            .ok_or_else(|| BackendError::ConfigurationError {
                message: "No project id in configuration or credential file".to_string(),
            })?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            tokens: TokenProvider::new(key),
            project_id,
            region: region.into(),
            model: model.into(),
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

    fn endpoint(&self) -> String {
        format!(
            "https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/publishers/google/models/{model}:generateContent",
            region = self.region,
            project = self.project_id,
            model = self.model,
        )
    }

    fn request_body<'a>(&self, request: &'a GenerationRequest) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: (request.response_format == ResponseFormat::Json)
                    .then_some("application/json"),
            },
        }
    }
}

#[async_trait]
impl GenerativeBackend for VertexBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion, BackendError> {
        let token = self
            .tokens
            .access_token(&self.http_client, self.timeout.as_secs())
            .await?;

        debug!(
            "Sending generateContent request: model={}, prompt_length={}",
            self.model,
            request.prompt.len()
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(token)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| {
                error!("generateContent request failed: {}", e);
                BackendError::from_reqwest(&e, self.timeout.as_secs())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &body));
        }

        let parsed: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    message: format!("JSON parse error: {}", e),
                    raw_response: None,
                })?;

        Ok(Completion::Text(parsed.text()))
    }

    fn name(&self) -> &str {
        "vertex-ai"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::CloudCredential
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{} ({}/{})", self.model, self.project_id, self.region))
    }
}

impl fmt::Debug for VertexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexBackend")
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, empty when there is none
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::TaskKind;
    use serde_json::json;

    #[test]
    fn test_response_text_joins_parts() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(parsed.text(), "{\"a\": 1}");
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.text().is_empty());
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerationRequest::new(TaskKind::Rewrite, "modernise");
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 4096,
                response_mime_type: Some("application/json"),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "modernise");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4096);
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_missing_credentials_file_fails() {
        let result = VertexBackend::new(
            Path::new("/nonexistent/sa.json"),
            Some("proj".to_string()),
            "us-central1",
            "gemini-1.5-pro",
            Duration::from_secs(30),
        );
        assert!(matches!(
            result,
            Err(BackendError::ConfigurationError { .. })
        ));
    }
}
