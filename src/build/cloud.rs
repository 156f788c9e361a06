//! Cloud Build REST backend
//!
//! Builds run from a `gs://bucket/object` source archive; logs are read back
//! from the build's logs bucket.

use super::backend::BuildBackend;
use super::types::{BuildError, BuildStatus};
use crate::llm::auth::{ServiceAccountKey, TokenProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

const API_BASE: &str = "https://cloudbuild.googleapis.com/v1";
const STORAGE_BASE: &str = "https://storage.googleapis.com/storage/v1";
const BUILD_TIMEOUT_SECS: u64 = 1800;

pub struct CloudBuildBackend {
    http_client: Client,
    tokens: TokenProvider,
    project_id: String,
    timeout: Duration,
}

impl CloudBuildBackend {
    /// Loads credentials and verifies that an access token can be obtained.
    pub async fn connect(
        credentials_path: &Path,
        project_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BuildError> {
        let key = ServiceAccountKey::load(credentials_path)
            .map_err(|e| BuildError::Configuration(e.to_string()))?;

        let project_id = project_id
            .or_else(|| key.project_id.clone())
            .ok_or_else(|| BuildError::Configuration("No project id configured".to_string()))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BuildError::Configuration(format!("HTTP client: {}", e)))?;

        let backend = Self {
            http_client,
            tokens: TokenProvider::new(key),
            project_id,
            timeout,
        };

        backend.token().await?;
        info!("Connected to Cloud Build for project {}", backend.project_id);
        Ok(backend)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn token(&self) -> Result<String, BuildError> {
        self.tokens
            .access_token(&self.http_client, self.timeout.as_secs())
            .await
            .map_err(|e| BuildError::Network {
                message: e.to_string(),
            })
    }

    async fn get_build(&self, build_id: &str) -> Result<BuildResource, BuildError> {
        let url = format!(
            "{}/projects/{}/builds/{}",
            API_BASE, self.project_id, build_id
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.token().await?)
            .send()
            .await
            .map_err(network_error)?;

        if response.status().as_u16() == 404 {
            return Err(BuildError::NotFound(build_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(BuildError::Backend {
                message: format!("HTTP {}", response.status()),
            });
        }

        response.json().await.map_err(|e| BuildError::Backend {
            message: format!("Malformed build resource: {}", e),
        })
    }
}

fn network_error(e: reqwest::Error) -> BuildError {
    error!("Cloud Build request failed: {}", e);
    BuildError::Network {
        message: e.to_string(),
    }
}

/// Splits `gs://bucket/path/to/object` into bucket and object.
pub fn parse_gcs_uri(uri: &str) -> Result<(&str, &str), BuildError> {
    uri.strip_prefix("gs://")
        .and_then(|rest| rest.split_once('/'))
        .filter(|(bucket, object)| !bucket.is_empty() && !object.is_empty())
        .ok_or_else(|| {
            BuildError::Configuration(format!("Expected a gs://bucket/object source, got {}", uri))
        })
}

fn build_request(bucket: &str, object: &str, image_tag: &str) -> serde_json::Value {
    json!({
        "source": {
            "storageSource": { "bucket": bucket, "object": object }
        },
        "steps": [
            {
                "name": "gcr.io/cloud-builders/docker",
                "args": ["build", "-t", image_tag, "-f", "Dockerfile", "."]
            },
            {
                "name": "gcr.io/cloud-builders/docker",
                "args": ["push", image_tag]
            }
        ],
        "timeout": format!("{}s", BUILD_TIMEOUT_SECS),
        "images": [image_tag]
    })
}

#[derive(Debug, Deserialize)]
struct Operation {
    metadata: OperationMetadata,
}

#[derive(Debug, Deserialize)]
struct OperationMetadata {
    build: BuildResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildResource {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    logs_bucket: Option<String>,
}

#[async_trait]
impl BuildBackend for CloudBuildBackend {
    async fn submit(&self, source_locator: &str, image_tag: &str) -> Result<String, BuildError> {
        let (bucket, object) = parse_gcs_uri(source_locator)?;
        let url = format!("{}/projects/{}/builds", API_BASE, self.project_id);

        debug!("Submitting Cloud Build for {}", source_locator);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.token().await?)
            .json(&build_request(bucket, object, image_tag))
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BuildError::Backend {
                message: format!(
                    "Build submission failed with HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            });
        }

        let operation: Operation = response.json().await.map_err(|e| BuildError::Backend {
            message: format!("Malformed operation: {}", e),
        })?;

        info!(build_id = %operation.metadata.build.id, "Build submitted");
        Ok(operation.metadata.build.id)
    }

    async fn poll(&self, build_id: &str) -> Result<BuildStatus, BuildError> {
        self.get_build(build_id)
            .await?
            .status
            .as_deref()
            .unwrap_or("QUEUED")
            .parse()
    }

    async fn fetch_logs(&self, build_id: &str) -> Result<String, BuildError> {
        let build = self.get_build(build_id).await?;
        let Some(logs_bucket) = build.logs_bucket else {
            return Ok(format!("No logs available for build {}", build_id));
        };

        let bucket = logs_bucket.trim_start_matches("gs://");
        let url = format!(
            "{}/b/{}/o/log-{}.txt?alt=media",
            STORAGE_BASE, bucket, build.id
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.token().await?)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Ok(format!(
                "Logs for build {} not readable (HTTP {})",
                build_id,
                response.status()
            ));
        }

        response.text().await.map_err(network_error)
    }

    fn name(&self) -> &str {
        "cloud-build"
    }
}

impl std::fmt::Debug for CloudBuildBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudBuildBackend")
            .field("project_id", &self.project_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}
