use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by the Messages API client
#[derive(Error, Debug)]
pub enum LlmApiError {
    /// HTTP 400
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP 401
    #[error("Invalid API key - authentication failed")]
    InvalidApiKey,

    /// HTTP 403
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// HTTP 404, usually an unknown model name
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// HTTP 429
    #[error("Rate limit exceeded - too many requests")]
    RateLimitExceeded,

    /// HTTP 5xx and the provider's 529 "overloaded"
    #[error("Server error ({0}): {1}")]
    ServerError(StatusCode, String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Missing API key: set llm.api_key or ANTHROPIC_API_KEY")]
    MissingApiKey,

    #[error("Unexpected response ({0}): {1}")]
    UnknownError(StatusCode, String),
}

impl LlmApiError {
    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::InvalidRequest(body),
            StatusCode::UNAUTHORIZED => Self::InvalidApiKey,
            StatusCode::FORBIDDEN => Self::Forbidden(body),
            StatusCode::NOT_FOUND => Self::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimitExceeded,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Self::Timeout,
            s if s.is_server_error() || s.as_u16() == 529 => Self::ServerError(s, body),
            s => Self::UnknownError(s, body),
        }
    }

    /// Returns true if this error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded | Self::ServerError(_, _) | Self::Timeout => true,
            Self::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Returns true if this is a permanent error that should not be retried
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::InvalidApiKey
                | Self::Forbidden(_)
                | Self::NotFound(_)
                | Self::MissingApiKey
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            LlmApiError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            LlmApiError::InvalidApiKey
        ));
        assert!(matches!(
            LlmApiError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            LlmApiError::RateLimitExceeded
        ));
        let overloaded = StatusCode::from_u16(529).unwrap();
        assert!(matches!(
            LlmApiError::from_status(overloaded, "overloaded".into()),
            LlmApiError::ServerError(_, _)
        ));
        assert!(matches!(
            LlmApiError::from_status(StatusCode::IM_A_TEAPOT, String::new()),
            LlmApiError::UnknownError(_, _)
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(LlmApiError::RateLimitExceeded.is_transient());
        assert!(LlmApiError::Timeout.is_transient());
        assert!(
            LlmApiError::ServerError(StatusCode::BAD_GATEWAY, "test".to_string()).is_transient()
        );
        assert!(!LlmApiError::InvalidApiKey.is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(LlmApiError::InvalidApiKey.is_permanent());
        assert!(LlmApiError::MissingApiKey.is_permanent());
        assert!(LlmApiError::InvalidRequest("bad".to_string()).is_permanent());
        assert!(!LlmApiError::RateLimitExceeded.is_permanent());
    }
}
