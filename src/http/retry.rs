//! Fixed-delay retry for provider fetches.
//!
//! Portals get a flat cooldown between attempts rather than escalating
//! backoff, and a permanently failing provider is retried on every call: there
//! is no circuit breaker. Attempts for one credential run strictly in
//! sequence.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::core::UsageOptions;
use crate::error::{ErrorCode, ErrorSanitizationConfig, Result, UsageError};
use crate::providers::ProviderClient;
use crate::types::{Credential, FetchOutcome};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY_MS: u64 = 2000;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one. Default: 3
    pub max_attempts: u32,

    /// Pause between attempts. Default: 2000ms
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_options(options: &UsageOptions) -> Self {
        Self::new(options.retry_attempts, options.retry_delay)
    }

    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// No pause between attempts, for tests and local tooling.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    max_attempts: Option<u32>,
    delay_ms: Option<u64>,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn delay_ms(mut self, delay: u64) -> Self {
        self.delay_ms = Some(delay);
        self
    }

    pub fn build(self) -> RetryConfig {
        RetryConfig::new(
            self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            Duration::from_millis(self.delay_ms.unwrap_or(DEFAULT_DELAY_MS)),
        )
    }
}

/// Result of a retry operation with metadata.
#[derive(Debug)]
pub struct RetryResult<T> {
    pub value: Option<T>,
    pub error: Option<UsageError>,
    pub attempts: u32,
    pub success: bool,
}

impl<T> RetryResult<T> {
    pub fn ok(value: T, attempts: u32) -> Self {
        Self {
            value: Some(value),
            error: None,
            attempts,
            success: true,
        }
    }

    pub fn err(error: UsageError, attempts: u32) -> Self {
        Self {
            value: None,
            error: Some(error),
            attempts,
            success: false,
        }
    }

    pub fn into_result(self) -> Result<T> {
        match (self.value, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(error)) => Err(error),
            (None, None) => Err(retry_limit_error()),
        }
    }
}

fn retry_limit_error() -> UsageError {
    UsageError::network_error(ErrorCode::NetworkRetryLimit, "Maximum retry attempts exceeded")
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget is spent. The operation is invoked afresh for every
/// attempt, so any session state it builds is never reused.
pub async fn with_retry_detailed<T, F, Fut>(operation: F, config: &RetryConfig) -> RetryResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<UsageError> = None;

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(result) => return RetryResult::ok(result, attempt),
            Err(e) => {
                if !e.is_retryable() {
                    tracing::debug!("Attempt {} failed with non-retryable error: {}", attempt, e);
                    return RetryResult::err(e, attempt);
                }

                if attempt < config.max_attempts {
                    tracing::debug!(
                        "Attempt {} of {} failed ({}), retrying in {:?}",
                        attempt,
                        config.max_attempts,
                        e,
                        config.delay
                    );
                    sleep(config.delay).await;
                }

                last_error = Some(e);
            }
        }
    }

    RetryResult::err(
        last_error.unwrap_or_else(retry_limit_error),
        config.max_attempts,
    )
}

/// Fetch and normalize one credential's accounts with retry.
///
/// Never returns an error: every failure is folded into the outcome, with the
/// message passed through the sanitizer first.
pub async fn fetch_with_retry(
    client: &dyn ProviderClient,
    credential: &Credential,
    config: &RetryConfig,
    sanitization: &ErrorSanitizationConfig,
) -> FetchOutcome {
    let result = with_retry_detailed(
        || async move {
            let raw = client.fetch_account(credential).await?;
            let accounts = client.normalize(raw);
            if accounts.is_empty() {
                return Err(UsageError::parse_error(
                    ErrorCode::ParseNoAccounts,
                    "no account information found",
                ));
            }
            Ok(accounts)
        },
        config,
    )
    .await;

    let attempts = result.attempts;
    match result.into_result() {
        Ok(accounts) => {
            tracing::info!(
                "Fetched {} account(s) for {} from {} in {} attempt(s)",
                accounts.len(),
                credential.username,
                client.provider(),
                attempts
            );
            FetchOutcome::succeeded(accounts, attempts)
        }
        Err(e) => {
            let message = e.to_public_message(sanitization);
            tracing::warn!(
                "Giving up on {} ({}) after {} attempt(s): {}",
                credential.username,
                client.provider(),
                attempts,
                message
            );
            FetchOutcome::failed(message, attempts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_builder() {
        let config = RetryConfig::builder().max_attempts(5).delay_ms(10).build();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.delay, Duration::from_millis(10));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryConfig::immediate(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let config = RetryConfig::immediate(3);
        let count = AtomicU32::new(0);

        let result = with_retry_detailed(
            || {
                count.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, UsageError>("ok") }
            },
            &config,
        )
        .await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_retries() {
        let config = RetryConfig::immediate(3);
        let count = AtomicU32::new(0);

        let result = with_retry_detailed(
            || {
                let n = count.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(UsageError::network_error(ErrorCode::HttpServerError, "502"))
                    } else {
                        Ok("ok")
                    }
                }
            },
            &config,
        )
        .await;

        assert!(result.success);
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn test_all_fail_reports_last_error() {
        let config = RetryConfig::immediate(3);
        let count = AtomicU32::new(0);

        let result: RetryResult<()> = with_retry_detailed(
            || {
                let n = count.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(UsageError::network_error(
                        ErrorCode::HttpTimeout,
                        format!("timeout {}", n),
                    ))
                }
            },
            &config,
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(result.error.unwrap().message, "timeout 2");
    }

    #[tokio::test]
    async fn test_config_error_fails_fast() {
        let config = RetryConfig::immediate(3);
        let count = AtomicU32::new(0);

        let result: RetryResult<()> = with_retry_detailed(
            || {
                count.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(UsageError::config_error(
                        ErrorCode::ConfigMissingClientSecret,
                        "client secret is not configured",
                    ))
                }
            },
            &config,
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_elapses_between_attempts() {
        let config = RetryConfig::new(3, Duration::from_millis(2000));
        let started = tokio::time::Instant::now();

        let _: RetryResult<()> = with_retry_detailed(
            || async { Err(UsageError::network_error(ErrorCode::NetworkError, "down")) },
            &config,
        )
        .await;

        assert!(started.elapsed() >= Duration::from_millis(4000));
    }
}
