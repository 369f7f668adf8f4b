use thiserror::Error;

pub mod sanitizer;

pub use sanitizer::{sanitize_message, ErrorSanitizationConfig, SanitizedMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Authentication errors
    AuthTokenRejected,
    AuthLoginFailed,
    AuthMissingCredential,

    // Network errors
    NetworkError,
    NetworkRetryLimit,

    // HTTP errors
    HttpBadRequest,
    HttpUnauthorized,
    HttpForbidden,
    HttpNotFound,
    HttpRateLimited,
    HttpServerError,
    HttpTimeout,
    HttpNetworkError,
    HttpInvalidResponse,
    HttpUnexpectedContentType,

    // Parse / extraction errors
    ParseEmptyBody,
    ParseInvalidJson,
    ParseNoAccounts,
    ParseMissingIdentifier,

    // Cache errors
    CacheReadError,
    CacheWriteError,
    CacheInvalidData,
    CacheUnavailable,

    // Configuration errors
    ConfigMissingClientSecret,
    ConfigMissingSessionToken,
    ConfigProviderNotRegistered,
    ConfigInvalidUrl,
    ConfigInvalidRetry,
    ConfigInvalidCacheTtl,
    ConfigInvalidTimeout,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthTokenRejected => "AUTH_TOKEN_REJECTED",
            ErrorCode::AuthLoginFailed => "AUTH_LOGIN_FAILED",
            ErrorCode::AuthMissingCredential => "AUTH_MISSING_CREDENTIAL",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::NetworkRetryLimit => "NETWORK_RETRY_LIMIT",
            ErrorCode::HttpBadRequest => "HTTP_BAD_REQUEST",
            ErrorCode::HttpUnauthorized => "HTTP_UNAUTHORIZED",
            ErrorCode::HttpForbidden => "HTTP_FORBIDDEN",
            ErrorCode::HttpNotFound => "HTTP_NOT_FOUND",
            ErrorCode::HttpRateLimited => "HTTP_RATE_LIMITED",
            ErrorCode::HttpServerError => "HTTP_SERVER_ERROR",
            ErrorCode::HttpTimeout => "HTTP_TIMEOUT",
            ErrorCode::HttpNetworkError => "HTTP_NETWORK_ERROR",
            ErrorCode::HttpInvalidResponse => "HTTP_INVALID_RESPONSE",
            ErrorCode::HttpUnexpectedContentType => "HTTP_UNEXPECTED_CONTENT_TYPE",
            ErrorCode::ParseEmptyBody => "PARSE_EMPTY_BODY",
            ErrorCode::ParseInvalidJson => "PARSE_INVALID_JSON",
            ErrorCode::ParseNoAccounts => "PARSE_NO_ACCOUNTS",
            ErrorCode::ParseMissingIdentifier => "PARSE_MISSING_IDENTIFIER",
            ErrorCode::CacheReadError => "CACHE_READ_ERROR",
            ErrorCode::CacheWriteError => "CACHE_WRITE_ERROR",
            ErrorCode::CacheInvalidData => "CACHE_INVALID_DATA",
            ErrorCode::CacheUnavailable => "CACHE_UNAVAILABLE",
            ErrorCode::ConfigMissingClientSecret => "CONFIG_MISSING_CLIENT_SECRET",
            ErrorCode::ConfigMissingSessionToken => "CONFIG_MISSING_SESSION_TOKEN",
            ErrorCode::ConfigProviderNotRegistered => "CONFIG_PROVIDER_NOT_REGISTERED",
            ErrorCode::ConfigInvalidUrl => "CONFIG_INVALID_URL",
            ErrorCode::ConfigInvalidRetry => "CONFIG_INVALID_RETRY",
            ErrorCode::ConfigInvalidCacheTtl => "CONFIG_INVALID_CACHE_TTL",
            ErrorCode::ConfigInvalidTimeout => "CONFIG_INVALID_TIMEOUT",
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::ConfigMissingClientSecret
                | ErrorCode::ConfigMissingSessionToken
                | ErrorCode::ConfigProviderNotRegistered
                | ErrorCode::ConfigInvalidUrl
                | ErrorCode::ConfigInvalidRetry
                | ErrorCode::ConfigInvalidCacheTtl
                | ErrorCode::ConfigInvalidTimeout
        )
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Upstream failures of every kind (network, status, empty body, missing
    /// fields) are retried. Configuration gaps and credentials missing a
    /// required secret are not: the next attempt would send the same request.
    pub fn is_retryable(&self) -> bool {
        !self.is_config_error() && *self != ErrorCode::AuthMissingCredential
    }

    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::CacheReadError
                | ErrorCode::CacheWriteError
                | ErrorCode::CacheInvalidData
                | ErrorCode::CacheUnavailable
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("[{code}] {message}")]
pub struct UsageError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl UsageError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn network_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn auth_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn parse_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn cache_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn provider_not_registered(provider: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::ConfigProviderNotRegistered,
            format!("No client registered for provider {}", provider),
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn is_config_error(&self) -> bool {
        self.code.is_config_error()
    }

    /// Render this error for callers, with secrets removed when enabled.
    pub fn to_public_message(&self, config: &ErrorSanitizationConfig) -> String {
        SanitizedMessage::new(&self.to_string(), config).sanitized
    }
}

pub type Result<T> = std::result::Result<T, UsageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let error = UsageError::new(ErrorCode::ParseNoAccounts, "no account information found");
        assert_eq!(
            error.to_string(),
            "[PARSE_NO_ACCOUNTS] no account information found"
        );
    }

    #[test]
    fn test_config_errors_are_not_retryable() {
        let error = UsageError::config_error(
            ErrorCode::ConfigMissingSessionToken,
            "session cookie is not configured",
        );
        assert!(error.is_config_error());
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_missing_credential_is_not_retryable() {
        assert!(!ErrorCode::AuthMissingCredential.is_retryable());
        assert!(!ErrorCode::AuthMissingCredential.is_config_error());
    }

    #[test]
    fn test_extraction_failures_are_retryable() {
        assert!(ErrorCode::ParseMissingIdentifier.is_retryable());
        assert!(ErrorCode::ParseEmptyBody.is_retryable());
        assert!(ErrorCode::HttpUnexpectedContentType.is_retryable());
    }

    #[test]
    fn test_with_source_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let error = UsageError::with_source(ErrorCode::CacheReadError, "read failed", io);
        assert!(error.source.is_some());
        assert!(error.code.is_cache_error());
    }

    #[test]
    fn test_public_message_is_sanitized() {
        let error = UsageError::new(
            ErrorCode::AuthLoginFailed,
            "login rejected for Bearer abcdef0123456789xyz",
        );
        let message = error.to_public_message(&ErrorSanitizationConfig::default());
        assert!(!message.contains("abcdef0123456789xyz"));
        assert!(message.contains("[AUTH_LOGIN_FAILED]"));
    }
}
