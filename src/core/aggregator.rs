use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::cache::{CacheBackend, CacheOptions, CacheStore, MemoryCacheBackend};
use super::config::UsageOptions;
use crate::error::{Result, UsageError};
use crate::http::{fetch_with_retry, HttpClient, RetryConfig};
use crate::providers::{ProviderClient, SessionPortalClient, TokenPortalClient};
use crate::types::{BatchResult, Credential, FetchOutcome, Provider};

/// Request header callers use to ask for fresh data.
pub const SKIP_CACHE_HEADER: &str = "x-skip-cache";

/// Read the skip-cache flag from a header value. Accepts `true`, `1` and
/// `yes` in any case; anything else, including a missing header, is `false`.
pub fn skip_cache_from_header(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) => matches!(v.as_str(), "true" | "1" | "yes"),
        None => false,
    }
}

/// Fields that identify one credential's cached result. Secrets are part of
/// the key so a wrong password can never be answered from cache.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialKey<'a> {
    username: &'a str,
    password: Option<&'a str>,
    client_secret: Option<&'a str>,
    provider: Provider,
}

/// Fans a batch of credentials out to their providers and merges the
/// results.
///
/// Each credential is cached under its own key, so adding a credential to a
/// batch never invalidates the others.
pub struct UsageAggregator {
    clients: HashMap<Provider, Arc<dyn ProviderClient>>,
    cache: CacheStore,
    retry: RetryConfig,
    options: UsageOptions,
}

impl UsageAggregator {
    /// Build an aggregator with both portal clients and an in-memory cache.
    pub fn new(options: UsageOptions) -> Result<Self> {
        options.validate()?;

        let backend = Arc::new(MemoryCacheBackend::new(options.max_cache_entries));
        let mut aggregator = Self::with_cache_backend(options, backend)?;

        let http = HttpClient::new(aggregator.options.timeout)?;
        aggregator.clients.insert(
            Provider::Dpdc,
            Arc::new(TokenPortalClient::new(
                http.clone(),
                aggregator.options.token_portal.clone(),
            )),
        );
        aggregator.clients.insert(
            Provider::Nesco,
            Arc::new(SessionPortalClient::new(
                http,
                aggregator.options.session_portal.clone(),
            )),
        );

        Ok(aggregator)
    }

    /// Build an aggregator with no provider clients over the given store.
    /// Register clients with [`UsageAggregator::with_client`].
    pub fn with_cache_backend(options: UsageOptions, backend: Arc<dyn CacheBackend>) -> Result<Self> {
        options.validate()?;

        let cache = CacheStore::new(backend, options.cache_ttl, options.cache_key_prefix.clone());
        let retry = RetryConfig::from_options(&options);

        Ok(Self {
            clients: HashMap::new(),
            cache,
            retry,
            options,
        })
    }

    /// Register or replace the client for its provider.
    pub fn with_client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.insert(client.provider(), client);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn options(&self) -> &UsageOptions {
        &self.options
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn has_client(&self, provider: Provider) -> bool {
        self.clients.contains_key(&provider)
    }

    /// Cache key scoped to one credential.
    pub fn cache_key(&self, credential: &Credential) -> Result<String> {
        self.cache.key(&CredentialKey {
            username: credential.username.trim(),
            password: credential.password.as_deref(),
            client_secret: credential.client_secret.as_deref(),
            provider: credential.provider,
        })
    }

    /// Fetch every credential concurrently and merge the outcomes.
    ///
    /// Never fails as a whole: per-credential failures are reported in
    /// [`BatchResult::failed_logins`], and the batch is successful when at
    /// least one account came back.
    pub async fn get_usage_data(&self, credentials: &[Credential], skip_cache: bool) -> BatchResult {
        tracing::info!(
            "Fetching usage for {} credential(s), skip_cache={}",
            credentials.len(),
            skip_cache
        );

        let outcomes = join_all(
            credentials
                .iter()
                .map(|credential| self.fetch_credential(credential, skip_cache)),
        )
        .await;

        let result = BatchResult::from_outcomes(credentials.iter().zip(outcomes));

        if result.success {
            tracing::info!(
                "Batch finished: {} account(s), {}/{} login(s) succeeded",
                result.total_accounts,
                result.successful_logins,
                result.total_credentials
            );
        } else {
            tracing::warn!(
                "Batch returned no accounts; {} login(s) failed",
                result.failed_logins.len()
            );
        }

        result
    }

    async fn fetch_credential(&self, credential: &Credential, skip_cache: bool) -> FetchOutcome {
        let client = match self.clients.get(&credential.provider) {
            Some(client) => Arc::clone(client),
            None => {
                let error = UsageError::provider_not_registered(credential.provider);
                return FetchOutcome::failed(error.to_public_message(&self.options.sanitization), 0);
            }
        };

        let fetch = || async {
            fetch_with_retry(client.as_ref(), credential, &self.retry, &self.options.sanitization).await
        };

        if !self.options.cache_enabled {
            return fetch().await;
        }

        let key = match self.cache_key(credential) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("No cache key for {}, fetching directly: {}", credential.username, e);
                return fetch().await;
            }
        };

        self.cache
            .get_or_set(&key, fetch, CacheOptions::skip(skip_cache))
            .await
    }

    /// Drop the cached result for one credential.
    pub async fn invalidate_credential(&self, credential: &Credential) -> Result<bool> {
        let key = self.cache_key(credential)?;
        self.cache.invalidate(&key).await
    }

    /// Drop every cached result under this aggregator's key prefix.
    pub async fn invalidate_all(&self) -> Result<usize> {
        let pattern = format!("{}:*", self.cache.prefix());
        self.cache.invalidate_pattern(&pattern).await
    }
}
