use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ErrorCode, Result, UsageError};
use crate::types::{BatchResult, CacheEntry, FetchOutcome};

/// Key/value store with native TTL, shared by every in-flight batch.
///
/// Implementations must be safe for concurrent use without external locking.
/// Errors mean the store itself is unreachable or misbehaving.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every key matching a glob pattern (`*` and `?`).
    async fn delete_matching(&self, pattern: &str) -> Result<usize>;
}

/// Values that may decide whether they are worth caching.
pub trait Cacheable {
    fn is_cacheable(&self) -> bool {
        true
    }
}

impl Cacheable for FetchOutcome {
    fn is_cacheable(&self) -> bool {
        self.success
    }
}

impl Cacheable for BatchResult {
    fn is_cacheable(&self) -> bool {
        self.success
    }
}

impl Cacheable for String {}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
    stored_at: Instant,
}

/// In-process backend with TTL and bounded size.
pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    max_entries: usize,
}

impl MemoryCacheBackend {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get_sync(&self, key: &str) -> Option<String> {
        let now = Instant::now();

        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(key) {
            if now >= entry.expires_at {
                entries.remove(key);
            }
        }

        None
    }

    /// Store `value` for `ttl`. Returns `false`, storing nothing, when the
    /// expiry cannot be represented.
    pub fn set_sync(&self, key: &str, value: String, ttl: Duration) -> bool {
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl) else {
            return false;
        };
        let entry = MemoryEntry {
            value,
            expires_at,
            stored_at: now,
        };

        let mut entries = self.entries.write();
        entries.insert(key.to_string(), entry);
        self.evict_if_needed(&mut entries);
        true
    }

    pub fn remove_sync(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn remove_matching_sync(&self, pattern: &str) -> usize {
        let Some(matcher) = glob_regex(pattern) else {
            return 0;
        };
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !matcher.is_match(key));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, MemoryEntry>) {
        if entries.len() <= self.max_entries {
            return;
        }

        let now = Instant::now();
        entries.retain(|_, entry| now < entry.expires_at);

        while entries.len() > self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone());

            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_sync(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        if self.set_sync(key, value, ttl) {
            Ok(())
        } else {
            Err(UsageError::cache_error(
                ErrorCode::CacheWriteError,
                format!("TTL of {}s is out of range", ttl.as_secs()),
            ))
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.remove_sync(key))
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize> {
        Ok(self.remove_matching_sync(pattern))
    }
}

fn glob_regex(pattern: &str) -> Option<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).ok()
}

/// Whether `key` matches a glob `pattern`.
pub fn glob_matches(pattern: &str, key: &str) -> bool {
    glob_regex(pattern).map(|re| re.is_match(key)).unwrap_or(false)
}

/// Serialize a JSON value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Deterministic cache key: `prefix:` followed by the SHA-256 of the
/// canonical JSON of `fields`. Field order never changes the key.
pub fn cache_key(prefix: &str, fields: &Value) -> String {
    let digest = Sha256::digest(canonical_json(fields).as_bytes());
    format!("{}:{:x}", prefix, digest)
}

/// Backends report their own failures with whatever code fits; the store
/// files anything outside the cache family under `code`.
fn store_error(error: UsageError, code: ErrorCode) -> UsageError {
    if error.code.is_cache_error() {
        error
    } else {
        let message = format!("Cache store failed: {}", error.message);
        UsageError::with_source(code, message, error)
    }
}

/// Per-call options for [`CacheStore::get_or_set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    /// Overrides the store's default TTL.
    pub ttl: Option<Duration>,
    /// Always run the factory; still store a cacheable result.
    pub skip_cache: bool,
}

impl CacheOptions {
    pub fn skip(skip_cache: bool) -> Self {
        Self {
            ttl: None,
            skip_cache,
        }
    }
}

/// Read-through cache over a [`CacheBackend`].
///
/// The store is an optimization only: when the backend fails, callers still
/// get a freshly computed value.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    prefix: String,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            default_ttl,
            prefix: prefix.into(),
        }
    }

    pub fn in_memory(max_entries: usize, default_ttl: Duration, prefix: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryCacheBackend::new(max_entries)), default_ttl, prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Key for any serializable set of identifying fields.
    pub fn key<S: Serialize + ?Sized>(&self, fields: &S) -> Result<String> {
        let value = serde_json::to_value(fields).map_err(|e| {
            UsageError::with_source(ErrorCode::CacheInvalidData, "Cache key fields not serializable", e)
        })?;
        Ok(cache_key(&self.prefix, &value))
    }

    /// Read a live entry. Entries whose embedded expiry has passed are
    /// treated as absent even if the backend still returns them.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = match self
            .backend
            .get(key)
            .await
            .map_err(|e| store_error(e, ErrorCode::CacheReadError))?
        {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let entry: CacheEntry<T> = serde_json::from_str(&raw).map_err(|e| {
            UsageError::with_source(ErrorCode::CacheInvalidData, "Cached entry is not readable", e)
        })?;

        if entry.is_expired() {
            tracing::debug!("Cache entry {} past its embedded expiry", key);
            if let Err(e) = self.backend.delete(key).await {
                tracing::debug!("Failed to drop expired entry {}: {}", key, e);
            }
            return Ok(None);
        }

        Ok(Some(entry.data))
    }

    /// Replace the entry for `key` wholesale.
    pub async fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Option<Duration>) -> Result<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry::new(data, ttl).ok_or_else(|| {
            UsageError::cache_error(
                ErrorCode::CacheWriteError,
                format!("TTL of {}s is out of range", ttl.as_secs()),
            )
        })?;
        let raw = serde_json::to_string(&entry).map_err(|e| {
            UsageError::with_source(ErrorCode::CacheWriteError, "Failed to encode cache entry", e)
        })?;
        self.backend
            .set(key, raw, ttl)
            .await
            .map_err(|e| store_error(e, ErrorCode::CacheWriteError))
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// Only cacheable values are stored, so failures are never served from
    /// cache. A backend error degrades to calling `factory` directly.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, factory: F, options: CacheOptions) -> T
    where
        T: Serialize + DeserializeOwned + Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if options.skip_cache {
            tracing::debug!("Cache bypass for {}", key);
        } else {
            match self.get::<T>(key).await {
                Ok(Some(value)) => {
                    tracing::debug!("Cache hit for {}", key);
                    return value;
                }
                Ok(None) => tracing::debug!("Cache miss for {}", key),
                Err(e) if e.code == ErrorCode::CacheInvalidData => {
                    tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                }
                Err(e) => {
                    tracing::warn!("Cache unavailable, fetching without cache: {}", e);
                    return factory().await;
                }
            }
        }

        let value = factory().await;

        if value.is_cacheable() {
            if let Err(e) = self.set(key, &value, options.ttl).await {
                tracing::warn!("Failed to store {} in cache: {}", key, e);
            }
        } else {
            tracing::debug!("Not caching unsuccessful result for {}", key);
        }

        value
    }

    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        self.backend
            .delete(key)
            .await
            .map_err(|e| store_error(e, ErrorCode::CacheUnavailable))
    }

    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        let removed = self
            .backend
            .delete_matching(pattern)
            .await
            .map_err(|e| store_error(e, ErrorCode::CacheUnavailable))?;
        tracing::debug!("Invalidated {} cache entries matching {}", removed, pattern);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_set_and_get() {
        let backend = MemoryCacheBackend::new(10);
        backend.set_sync("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(backend.get_sync("k"), Some("v".to_string()));
        assert_eq!(backend.get_sync("missing"), None);
    }

    #[test]
    fn test_memory_native_ttl() {
        let backend = MemoryCacheBackend::new(10);
        backend.set_sync("k", "v".to_string(), Duration::ZERO);
        assert_eq!(backend.get_sync("k"), None);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_memory_skips_unrepresentable_ttl() {
        let backend = MemoryCacheBackend::new(10);
        assert!(!backend.set_sync("k", "v".to_string(), Duration::MAX));
        assert!(backend.is_empty());
        assert!(backend.set_sync("k", "v".to_string(), Duration::from_secs(60)));
    }

    #[test]
    fn test_store_error_keeps_cache_codes() {
        let own = UsageError::cache_error(ErrorCode::CacheInvalidData, "bad entry");
        assert_eq!(store_error(own, ErrorCode::CacheReadError).code, ErrorCode::CacheInvalidData);

        let foreign = UsageError::network_error(ErrorCode::NetworkError, "connection reset");
        let mapped = store_error(foreign, ErrorCode::CacheReadError);
        assert_eq!(mapped.code, ErrorCode::CacheReadError);
        assert!(mapped.source.is_some());
    }

    #[test]
    fn test_memory_evicts_oldest() {
        let backend = MemoryCacheBackend::new(2);
        backend.set_sync("a", "1".to_string(), Duration::from_secs(60));
        backend.set_sync("b", "2".to_string(), Duration::from_secs(60));
        backend.set_sync("c", "3".to_string(), Duration::from_secs(60));

        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get_sync("a"), None);
        assert_eq!(backend.get_sync("c"), Some("3".to_string()));
    }

    #[test]
    fn test_glob_matching() {
        assert!(glob_matches("usage:*", "usage:abc"));
        assert!(glob_matches("usage:?bc", "usage:abc"));
        assert!(!glob_matches("usage:*", "other:abc"));
        assert!(glob_matches("a.b", "a.b"));
        assert!(!glob_matches("a.b", "axb"));
    }

    #[test]
    fn test_remove_matching() {
        let backend = MemoryCacheBackend::new(10);
        backend.set_sync("usage:1", "x".to_string(), Duration::from_secs(60));
        backend.set_sync("usage:2", "x".to_string(), Duration::from_secs(60));
        backend.set_sync("other:1", "x".to_string(), Duration::from_secs(60));

        assert_eq!(backend.remove_matching_sync("usage:*"), 2);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": {"y": 1, "x": [ {"d": 1, "c": 2} ]}, "a": "s"});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":"s","b":{"x":[{"c":2,"d":1}],"y":1}}"#
        );
    }

    #[test]
    fn test_cache_key_shape() {
        let key = cache_key("usage", &json!({"username": "a"}));
        assert!(key.starts_with("usage:"));
        assert_eq!(key.len(), "usage:".len() + 64);
    }

    #[tokio::test]
    async fn test_expired_envelope_is_a_miss() {
        let backend = Arc::new(MemoryCacheBackend::new(10));
        let store = CacheStore::new(backend.clone(), Duration::from_secs(60), "t");

        let stale = CacheEntry {
            data: "old".to_string(),
            cached_at: chrono::Utc::now() - chrono::Duration::seconds(120),
            expires_at: chrono::Utc::now() - chrono::Duration::seconds(60),
        };
        backend.set_sync(
            "t:k",
            serde_json::to_string(&stale).unwrap(),
            Duration::from_secs(600),
        );

        let value: Option<String> = store.get("t:k").await.unwrap();
        assert!(value.is_none());
        assert!(backend.get_sync("t:k").is_none());
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_replaced() {
        let backend = Arc::new(MemoryCacheBackend::new(10));
        let store = CacheStore::new(backend.clone(), Duration::from_secs(60), "t");
        backend.set_sync("t:k", "not json".to_string(), Duration::from_secs(60));

        let value = store
            .get_or_set("t:k", || async { "fresh".to_string() }, CacheOptions::default())
            .await;

        assert_eq!(value, "fresh");
        let cached: Option<String> = store.get("t:k").await.unwrap();
        assert_eq!(cached.as_deref(), Some("fresh"));
    }
}
