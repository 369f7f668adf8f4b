use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Utility providers the core knows how to fetch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// Bearer-token JSON portal.
    #[serde(rename = "DPDC")]
    Dpdc,
    /// Legacy CSRF/session-cookie HTML portal.
    #[serde(rename = "NESCO")]
    Nesco,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Dpdc, Provider::Nesco];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Dpdc => "DPDC",
            Provider::Nesco => "NESCO",
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(identifier.trim()))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login material for one utility account, supplied per call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub provider: Provider,
}

impl Credential {
    pub fn new(username: impl Into<String>, provider: Provider) -> Self {
        Self {
            username: username.into(),
            password: None,
            client_secret: None,
            provider,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("provider", &self.provider)
            .finish()
    }
}

/// Provider-agnostic account record.
///
/// Values stay strings so provider formatting (currency, locale) is kept as
/// the portal returned it. Dates are `YYYY-MM-DD` when they could be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAccount {
    pub account_id: String,
    pub customer_number: String,
    pub customer_name: String,
    pub provider: Provider,
    pub account_type: String,
    pub balance_remaining: String,
    pub connection_status: String,
    pub last_payment_amount: String,
    pub last_payment_date: String,
    pub balance_latest_date: String,
    pub location: String,
    pub mobile_number: String,
    pub min_recharge: Option<String>,
}

/// Result of fetching one credential, after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    pub success: bool,
    pub accounts: Vec<NormalizedAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Tries made, from 1 up to the retry limit. 0 when no client is
    /// registered for the credential's provider and nothing was attempted.
    pub attempts: u32,
}

impl FetchOutcome {
    pub fn succeeded(accounts: Vec<NormalizedAccount>, attempts: u32) -> Self {
        Self {
            success: true,
            accounts,
            error: None,
            attempts,
        }
    }

    pub fn failed(error: impl Into<String>, attempts: u32) -> Self {
        Self {
            success: false,
            accounts: Vec::new(),
            error: Some(error.into()),
            attempts,
        }
    }
}

/// Per-credential failure attribution inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedLogin {
    pub username: String,
    pub provider: Provider,
    pub error: String,
    pub attempts: u32,
}

/// Consolidated result of one batch across credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// True when at least one account was retrieved.
    pub success: bool,
    pub total_credentials: usize,
    pub successful_logins: usize,
    pub total_accounts: usize,
    pub accounts: Vec<NormalizedAccount>,
    pub failed_logins: Vec<FailedLogin>,
}

impl BatchResult {
    /// Fold per-credential outcomes, paired with their credentials, into one
    /// batch result.
    pub fn from_outcomes<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = (&'a Credential, FetchOutcome)>,
    {
        let mut result = Self {
            success: false,
            total_credentials: 0,
            successful_logins: 0,
            total_accounts: 0,
            accounts: Vec::new(),
            failed_logins: Vec::new(),
        };

        for (credential, outcome) in outcomes {
            result.total_credentials += 1;
            if outcome.success {
                result.successful_logins += 1;
                result.accounts.extend(outcome.accounts);
            } else {
                result.failed_logins.push(FailedLogin {
                    username: credential.username.clone(),
                    provider: credential.provider,
                    error: outcome
                        .error
                        .unwrap_or_else(|| "unknown error".to_string()),
                    attempts: outcome.attempts,
                });
            }
        }

        result.total_accounts = result.accounts.len();
        result.success = result.total_accounts > 0;
        result
    }
}

/// Envelope stored in the cache around every value.
///
/// Entries are replaced wholesale on refresh, never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Wrap `data` for storage. `None` when `ttl` puts the expiry beyond the
    /// representable date range.
    pub fn new(data: T, ttl: std::time::Duration) -> Option<Self> {
        let cached_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).ok()?;
        let expires_at = cached_at.checked_add_signed(ttl)?;
        Some(Self {
            data,
            cached_at,
            expires_at,
        })
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_identifiers() {
        assert_eq!(Provider::Dpdc.as_str(), "DPDC");
        assert_eq!(Provider::from_identifier("nesco"), Some(Provider::Nesco));
        assert_eq!(Provider::from_identifier("unknown"), None);
    }

    #[test]
    fn test_credential_debug_redacts_secrets() {
        let credential = Credential::new("alice", Provider::Dpdc)
            .with_password("hunter2")
            .with_client_secret("xyz");
        let debug = format!("{:?}", credential);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("xyz"));
    }

    #[test]
    fn test_credential_deserializes_camel_case() {
        let json = r#"{"username":"77001234","clientSecret":"s","provider":"NESCO"}"#;
        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.provider, Provider::Nesco);
        assert_eq!(credential.client_secret.as_deref(), Some("s"));
        assert!(credential.password.is_none());
    }

    #[test]
    fn test_cache_entry_expiry() {
        let fresh = CacheEntry::new(1u8, std::time::Duration::from_secs(60)).unwrap();
        assert!(!fresh.is_expired());

        let stale = CacheEntry::new(1u8, std::time::Duration::ZERO).unwrap();
        assert!(stale.is_expired());
    }

    #[test]
    fn test_cache_entry_rejects_unrepresentable_ttl() {
        assert!(CacheEntry::new(1u8, std::time::Duration::MAX).is_none());
        assert!(CacheEntry::new(1u8, std::time::Duration::from_secs(u64::MAX / 2)).is_none());
    }

    #[test]
    fn test_empty_batch_is_unsuccessful() {
        let result = BatchResult::from_outcomes(Vec::new());
        assert!(!result.success);
        assert_eq!(result.total_credentials, 0);
    }
}
