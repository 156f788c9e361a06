use super::backend::BuildBackend;
use super::cloud::CloudBuildBackend;
use super::simulated::SimulatedBuildBackend;
use super::types::{BuildError, BuildMode, BuildStatus, VerificationOutcome};
use crate::config::RetrofitConfig;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_POLLS: u32 = 120;
const DEFAULT_IMAGE_REPOSITORY: &str = "retrofit-modernized";

/// Triggers verification builds and reports their progress
#[derive(Clone)]
pub struct BuildVerifier {
    backend: Arc<dyn BuildBackend>,
    image_repository: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl BuildVerifier {
    pub fn new(backend: Arc<dyn BuildBackend>) -> Self {
        Self {
            backend,
            image_repository: DEFAULT_IMAGE_REPOSITORY.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn simulated() -> Self {
        Self::new(Arc::new(SimulatedBuildBackend::new()))
    }

    /// Builds the verifier the configuration asks for.
    ///
    /// A cloud backend that cannot be reached at construction demotes to the
    /// simulated backend with a warning; this never fails.
    pub async fn from_config(config: &RetrofitConfig) -> Self {
        let mode = config.build_mode().unwrap_or_default();
        if mode == BuildMode::Simulated {
            info!("Build verification in simulate mode");
            return Self::simulated();
        }

        let Some(path) = config.credentials_path.as_deref() else {
            warn!("Cloud build requested without credentials, falling back to simulate mode");
            return Self::simulated();
        };

        match CloudBuildBackend::connect(path, config.project_id.clone(), config.request_timeout())
            .await
        {
            Ok(backend) => {
                let repository = format!("gcr.io/{}/{}", backend.project_id(), DEFAULT_IMAGE_REPOSITORY);
                Self::new(Arc::new(backend)).with_image_repository(repository)
            }
            Err(e) => {
                warn!("Failed to initialize cloud build backend: {}", e);
                warn!("Falling back to simulate mode");
                Self::simulated()
            }
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self
    }

    pub fn with_image_repository(mut self, repository: impl Into<String>) -> Self {
        self.image_repository = repository.into();
        self
    }

    pub fn is_simulated(&self) -> bool {
        self.backend.is_simulated()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Image tag for an artifact: the repository plus a short content hash of
    /// its locator
    pub fn image_tag(&self, artifact_ref: &str) -> String {
        let digest = Sha256::digest(artifact_ref.as_bytes());
        format!("{}:{}", self.image_repository, &hex::encode(digest)[..12])
    }

    /// Allocates a new build for `artifact_ref`. Never waits for completion.
    pub async fn trigger(&self, artifact_ref: &str) -> Result<VerificationOutcome, BuildError> {
        let build_id = self
            .backend
            .submit(artifact_ref, &self.image_tag(artifact_ref))
            .await?;
        info!(build_id = %build_id, "Verification build triggered");
        Ok(VerificationOutcome::new(build_id, BuildStatus::Queued))
    }

    pub async fn status(&self, build_id: &str) -> Result<VerificationOutcome, BuildError> {
        let status = self.backend.poll(build_id).await?;
        debug!(build_id = %build_id, "Build status: {}", status);
        Ok(VerificationOutcome::new(build_id, status))
    }

    pub async fn logs(&self, build_id: &str) -> Result<String, BuildError> {
        self.backend.fetch_logs(build_id).await
    }

    /// Polls until the build reaches a terminal status, attaching its logs.
    ///
    /// Exceeding `max_polls` yields a TIMEOUT outcome.
    pub async fn wait_for_completion(
        &self,
        build_id: &str,
    ) -> Result<VerificationOutcome, BuildError> {
        for poll in 0..self.max_polls {
            let outcome = self.status(build_id).await?;
            if outcome.status.is_terminal() {
                let logs = self.logs(build_id).await?;
                info!(build_id = %build_id, polls = poll + 1, "Build finished: {}", outcome.status);
                return Ok(outcome.with_logs(logs));
            }

            self.backend.advance(build_id).await?;
            tokio::time::sleep(self.poll_interval).await;
        }

        warn!(build_id = %build_id, "Build did not finish after {} polls", self.max_polls);
        let logs = self.logs(build_id).await.unwrap_or_default();
        Ok(VerificationOutcome::new(build_id, BuildStatus::Timeout).with_logs(logs))
    }
}

impl std::fmt::Debug for BuildVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildVerifier")
            .field("backend", &self.backend.name())
            .field("image_repository", &self.image_repository)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}
