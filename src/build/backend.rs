use super::types::{BuildError, BuildStatus};
use async_trait::async_trait;

/// A build system able to build a container image from stored sources
#[async_trait]
pub trait BuildBackend: Send + Sync {
    /// Starts a build and returns its identifier without waiting for it.
    async fn submit(&self, source_locator: &str, image_tag: &str) -> Result<String, BuildError>;

    async fn poll(&self, build_id: &str) -> Result<BuildStatus, BuildError>;

    async fn fetch_logs(&self, build_id: &str) -> Result<String, BuildError>;

    /// Moves a simulated build one step forward. Real backends progress on
    /// their own.
    async fn advance(&self, _build_id: &str) -> Result<(), BuildError> {
        Ok(())
    }

    fn name(&self) -> &str;

    fn is_simulated(&self) -> bool {
        false
    }
}
