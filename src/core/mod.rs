mod aggregator;
mod cache;
mod config;

pub use aggregator::{skip_cache_from_header, UsageAggregator, SKIP_CACHE_HEADER};
pub use cache::{
    cache_key, canonical_json, glob_matches, CacheBackend, CacheOptions, CacheStore, Cacheable,
    MemoryCacheBackend,
};
pub use config::{
    SessionPortalConfig, TokenPortalConfig, UsageOptions, UsageOptionsBuilder,
    DEFAULT_ACTIVE_STATUS_CODE, DEFAULT_CACHE_KEY_PREFIX, DEFAULT_CACHE_TTL,
    DEFAULT_MAX_CACHE_ENTRIES, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY,
    DEFAULT_SESSION_PORTAL_URL, DEFAULT_TENANT_CODE, DEFAULT_TIMEOUT, DEFAULT_TOKEN_CLIENT_ID,
    DEFAULT_TOKEN_PORTAL_URL, MAX_CACHE_TTL,
};
