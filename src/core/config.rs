use std::time::Duration;

use crate::error::{ErrorCode, ErrorSanitizationConfig, Result, UsageError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
/// Longest TTL accepted for cached outcomes (30 days).
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 1000;
pub const DEFAULT_CACHE_KEY_PREFIX: &str = "usage";

pub const DEFAULT_TOKEN_PORTAL_URL: &str = "https://amiapp.dpdc.org.bd";
pub const DEFAULT_TOKEN_CLIENT_ID: &str = "auth-ui";
pub const DEFAULT_TENANT_CODE: &str = "DPDC";
pub const DEFAULT_ACTIVE_STATUS_CODE: &str = "02";
pub const DEFAULT_SESSION_PORTAL_URL: &str = "https://customer.nesco.gov.bd";

/// Settings for the bearer-token portal.
#[derive(Debug, Clone)]
pub struct TokenPortalConfig {
    pub base_url: String,
    pub client_id: String,
    /// Fallback when a credential carries no client secret of its own.
    pub client_secret: Option<String>,
    pub tenant_code: String,
    /// Status code the portal uses for a live connection.
    pub active_status_code: String,
}

impl Default for TokenPortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TOKEN_PORTAL_URL.to_string(),
            client_id: DEFAULT_TOKEN_CLIENT_ID.to_string(),
            client_secret: None,
            tenant_code: DEFAULT_TENANT_CODE.to_string(),
            active_status_code: DEFAULT_ACTIVE_STATUS_CODE.to_string(),
        }
    }
}

/// Settings for the CSRF/session-cookie portal.
///
/// The cookie and token are provisioned by an operator; the portal offers no
/// headless way to obtain them.
#[derive(Debug, Clone)]
pub struct SessionPortalConfig {
    pub base_url: String,
    pub session_cookie: Option<String>,
    pub csrf_token: Option<String>,
}

impl Default for SessionPortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SESSION_PORTAL_URL.to_string(),
            session_cookie: None,
            csrf_token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UsageOptions {
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub cache_ttl: Duration,
    pub cache_enabled: bool,
    pub max_cache_entries: usize,
    pub cache_key_prefix: String,
    pub token_portal: TokenPortalConfig,
    pub session_portal: SessionPortalConfig,
    pub sanitization: ErrorSanitizationConfig,
}

impl Default for UsageOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageOptions {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_enabled: true,
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
            cache_key_prefix: DEFAULT_CACHE_KEY_PREFIX.to_string(),
            token_portal: TokenPortalConfig::default(),
            session_portal: SessionPortalConfig::default(),
            sanitization: ErrorSanitizationConfig::default(),
        }
    }

    pub fn builder() -> UsageOptionsBuilder {
        UsageOptionsBuilder::new()
    }

    /// Build options from defaults overlaid with `USAGE_*` environment
    /// variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`UsageOptions::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::new();

        if let Some(secs) = parse_var::<u64, _>(&lookup, "USAGE_TIMEOUT_SECS", ErrorCode::ConfigInvalidTimeout)? {
            options.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var::<u32, _>(&lookup, "USAGE_RETRY_ATTEMPTS", ErrorCode::ConfigInvalidRetry)? {
            options.retry_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "USAGE_RETRY_DELAY_MS", ErrorCode::ConfigInvalidRetry)? {
            options.retry_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "USAGE_CACHE_TTL_SECS", ErrorCode::ConfigInvalidCacheTtl)? {
            options.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(url) = non_empty(&lookup, "USAGE_TOKEN_BASE_URL") {
            options.token_portal.base_url = url;
        }
        if let Some(client_id) = non_empty(&lookup, "USAGE_TOKEN_CLIENT_ID") {
            options.token_portal.client_id = client_id;
        }
        if let Some(secret) = non_empty(&lookup, "USAGE_TOKEN_CLIENT_SECRET") {
            options.token_portal.client_secret = Some(secret);
        }
        if let Some(url) = non_empty(&lookup, "USAGE_SESSION_BASE_URL") {
            options.session_portal.base_url = url;
        }
        if let Some(cookie) = non_empty(&lookup, "USAGE_SESSION_COOKIE") {
            options.session_portal.session_cookie = Some(cookie);
        }
        if let Some(token) = non_empty(&lookup, "USAGE_SESSION_CSRF_TOKEN") {
            options.session_portal.csrf_token = Some(token);
        }

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(UsageError::config_error(
                ErrorCode::ConfigInvalidTimeout,
                "Request timeout must be positive",
            ));
        }

        if self.retry_attempts == 0 {
            return Err(UsageError::config_error(
                ErrorCode::ConfigInvalidRetry,
                "At least one fetch attempt is required",
            ));
        }

        if self.cache_ttl.is_zero() {
            return Err(UsageError::config_error(
                ErrorCode::ConfigInvalidCacheTtl,
                "Cache TTL must be positive",
            ));
        }

        if self.cache_ttl > MAX_CACHE_TTL {
            return Err(UsageError::config_error(
                ErrorCode::ConfigInvalidCacheTtl,
                format!(
                    "Cache TTL must be at most {}s, got {}s",
                    MAX_CACHE_TTL.as_secs(),
                    self.cache_ttl.as_secs()
                ),
            ));
        }

        for url in [&self.token_portal.base_url, &self.session_portal.base_url] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(UsageError::config_error(
                    ErrorCode::ConfigInvalidUrl,
                    format!("Invalid portal base URL: {:?}", url),
                ));
            }
        }

        Ok(())
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T, F>(lookup: &F, key: &str, code: ErrorCode) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            UsageError::config_error(code, format!("{} is not a valid number: {:?}", key, raw))
        }),
        None => Ok(None),
    }
}

pub struct UsageOptionsBuilder {
    options: UsageOptions,
}

impl UsageOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: UsageOptions::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.options.retry_attempts = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.options.retry_delay = delay;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.options.cache_ttl = ttl;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.options.cache_enabled = enabled;
        self
    }

    pub fn max_cache_entries(mut self, entries: usize) -> Self {
        self.options.max_cache_entries = entries;
        self
    }

    pub fn cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.cache_key_prefix = prefix.into();
        self
    }

    pub fn token_portal(mut self, config: TokenPortalConfig) -> Self {
        self.options.token_portal = config;
        self
    }

    pub fn token_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.options.token_portal.client_secret = Some(secret.into());
        self
    }

    pub fn session_portal(mut self, config: SessionPortalConfig) -> Self {
        self.options.session_portal = config;
        self
    }

    pub fn session_tokens(mut self, cookie: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        self.options.session_portal.session_cookie = Some(cookie.into());
        self.options.session_portal.csrf_token = Some(csrf_token.into());
        self
    }

    pub fn sanitization(mut self, config: ErrorSanitizationConfig) -> Self {
        self.options.sanitization = config;
        self
    }

    pub fn build(self) -> UsageOptions {
        self.options
    }
}

impl Default for UsageOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
