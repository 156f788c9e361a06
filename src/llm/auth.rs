//! Service-account credentials for the credential-authenticated cloud backend
//!
//! Exchanges a signed RS256 JWT assertion for an OAuth access token and
//! caches it until shortly before expiry.

use super::error::BackendError;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer";
const ASSERTION_TTL_SECS: i64 = 3600;
/// Refresh this many seconds before the token actually expires
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a service-account key file that are needed for token exchange
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Reads and validates a key file. Any failure is a configuration error.
    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| BackendError::ConfigurationError {
                message: format!("Cannot read credentials {}: {}", path.display(), e),
            })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, BackendError> {
        let key: ServiceAccountKey =
            serde_json::from_str(content).map_err(|e| BackendError::ConfigurationError {
                message: format!("Malformed service-account key: {}", e),
            })?;
        key.encoding_key()?;
        Ok(key)
    }

    fn encoding_key(&self) -> Result<EncodingKey, BackendError> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
            BackendError::ConfigurationError {
                message: format!("Invalid service-account private key: {}", e),
            }
        })
    }

    fn claims(&self, now: i64) -> AssertionClaims {
        AssertionClaims {
            iss: self.client_email.clone(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        }
    }

    fn signed_assertion(&self, now: i64) -> Result<String, BackendError> {
        encode(
            &Header::new(Algorithm::RS256),
            &self.claims(now),
            &self.encoding_key()?,
        )
        .map_err(|e| BackendError::AuthenticationError {
            message: format!("Failed to sign assertion: {}", e),
        })
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_TTL_SECS
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Hands out access tokens, exchanging a fresh assertion when the cached one
/// is about to expire
pub struct TokenProvider {
    key: ServiceAccountKey,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            cached: Mutex::new(None),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    pub async fn access_token(
        &self,
        http: &reqwest::Client,
        timeout_secs: u64,
    ) -> Result<String, BackendError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        debug!("Exchanging service-account assertion for access token");
        let assertion = self.key.signed_assertion(now)?;

        let response = http
            .post(&self.key.token_uri)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!(
                "grant_type={}&assertion={}",
                JWT_BEARER_GRANT, assertion
            ))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e, timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BackendError::AuthenticationError {
                message: format!("Token exchange failed with HTTP {}", status),
            });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    message: format!("Token response parse error: {}", e),
                    raw_response: None,
                })?;

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + token.expires_in,
        });

        Ok(token.access_token)
    }
}
