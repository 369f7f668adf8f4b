//! Error message sanitization for failure text that leaves the core.
//!
//! Failure messages end up in `FetchOutcome.error` and the batch's
//! `failedLogins`, which are handed to API and notification layers. Upstream
//! errors can echo request details, so this module strips:
//!
//! - Bearer tokens
//! - Secret-bearing key/value pairs (passwords, client secrets, CSRF tokens,
//!   session cookies)
//! - Email addresses
//! - IP addresses
//! - Cache store connection strings

use lazy_static::lazy_static;
use regex::Regex;

/// Configuration for error message sanitization.
#[derive(Debug, Clone)]
pub struct ErrorSanitizationConfig {
    /// Whether sanitization is enabled. Defaults to true.
    pub enabled: bool,
    /// Whether to keep the original (unsanitized) message alongside.
    /// Defaults to false.
    pub preserve_original: bool,
}

impl Default for ErrorSanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preserve_original: false,
        }
    }
}

impl ErrorSanitizationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with sanitization disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            preserve_original: false,
        }
    }

    /// Create a config that preserves original messages internally.
    pub fn with_preservation() -> Self {
        Self {
            enabled: true,
            preserve_original: true,
        }
    }
}

lazy_static! {
    static ref PATTERNS: Vec<(Regex, &'static str)> = vec![
        // Authorization headers
        (Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]{8,}").unwrap(), "Bearer [REDACTED]"),
        // Secret-bearing pairs, form-encoded, header-style or JSON-ish
        (
            Regex::new(
                r#"(?i)\b(password|passwd|client_?secret|access_token|_token|x-csrf-token|xsrf-token|jsessionid|[a-z_]*session)"?\s*[=:]\s*"?[^\s;&",]+"#
            )
            .unwrap(),
            "${1}=[REDACTED]",
        ),
        // Email addresses (including + for plus addressing)
        (Regex::new(r"[\w.+-]+@[\w.-]+\.\w+").unwrap(), "[EMAIL]"),
        // IPv4 addresses
        (Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap(), "[IP]"),
        // Cache store connection strings
        (Regex::new(r"(?i)(?:redis|rediss|memcached)://[^\s]+").unwrap(), "[CONNECTION_STRING]"),
    ];
}

/// Sanitize a message by replacing every sensitive match with a placeholder.
///
/// # Examples
///
/// ```
/// use utility_usage::error::sanitizer::sanitize_message;
///
/// let sanitized = sanitize_message("login failed: password=hunter2 from 10.1.2.3");
/// assert_eq!(sanitized, "login failed: password=[REDACTED] from [IP]");
/// ```
pub fn sanitize_message(message: &str) -> String {
    let mut result = message.to_string();

    for (pattern, replacement) in PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }

    result
}

/// Holds both the sanitized and, optionally, the original message.
#[derive(Debug, Clone)]
pub struct SanitizedMessage {
    pub sanitized: String,
    pub original: Option<String>,
}

impl SanitizedMessage {
    pub fn new(message: &str, config: &ErrorSanitizationConfig) -> Self {
        if config.enabled {
            Self {
                sanitized: sanitize_message(message),
                original: if config.preserve_original {
                    Some(message.to_string())
                } else {
                    None
                },
            }
        } else {
            Self {
                sanitized: message.to_string(),
                original: None,
            }
        }
    }

    pub fn display(&self) -> &str {
        &self.sanitized
    }

    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }
}

impl std::fmt::Display for SanitizedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sanitized)
    }
}
