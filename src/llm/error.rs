//! Generative backend errors
//!
//! [`BackendError`] describes a single failed call against one transport.
//! [`GenerationError`] is what callers of the resilient client see once the
//! retry budget is spent.

use thiserror::Error;

/// Errors that can occur during a single backend call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("API error{}: {message}", .status_code.map(|c| format!(" ({})", c)).unwrap_or_default())]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    #[error("Request timed out after {seconds} seconds")]
    TimeoutError { seconds: u64 },

    #[error("Rate limit exceeded")]
    RateLimitError { retry_after: Option<u64> },

    /// The backend answered but produced nothing usable (e.g. empty text)
    #[error("Invalid response from model: {message}")]
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Error: {message}")]
    Other { message: String },
}

impl BackendError {
    /// Maps a transport-level reqwest error.
    pub fn from_reqwest(e: &reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            BackendError::TimeoutError {
                seconds: timeout_secs,
            }
        } else if e.is_connect() {
            BackendError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else {
            BackendError::NetworkError {
                message: format!("Request failed: {}", e),
            }
        }
    }

    /// Maps a non-success HTTP status and its body.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => BackendError::AuthenticationError {
                message: format!("HTTP {}", status),
            },
            429 => BackendError::RateLimitError { retry_after: None },
            code => BackendError::ApiError {
                message: format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
                status_code: Some(code),
            },
        }
    }
}

/// Generation failed on the selected backend after all permitted attempts
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("{backend} unavailable after {attempts} attempt(s): {source}")]
    Unavailable {
        backend: String,
        attempts: u32,
        #[source]
        source: BackendError,
    },
}

impl GenerationError {
    pub fn attempts(&self) -> u32 {
        match self {
            GenerationError::Unavailable { attempts, .. } => *attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let with_code = BackendError::ApiError {
            message: "boom".to_string(),
            status_code: Some(500),
        };
        assert_eq!(with_code.to_string(), "API error (500): boom");

        let without = BackendError::ApiError {
            message: "boom".to_string(),
            status_code: None,
        };
        assert_eq!(without.to_string(), "API error: boom");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            BackendError::from_status(reqwest::StatusCode::UNAUTHORIZED, ""),
            BackendError::AuthenticationError { .. }
        ));
        assert!(matches!(
            BackendError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            BackendError::RateLimitError { .. }
        ));
        assert!(matches!(
            BackendError::from_status(reqwest::StatusCode::BAD_GATEWAY, "upstream"),
            BackendError::ApiError {
                status_code: Some(502),
                ..
            }
        ));
    }

    #[test]
    fn test_unavailable_wraps_source() {
        let err = GenerationError::Unavailable {
            backend: "gemini".to_string(),
            attempts: 3,
            source: BackendError::TimeoutError { seconds: 60 },
        };
        assert_eq!(err.attempts(), 3);
        assert!(err.to_string().contains("after 3 attempt(s)"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
