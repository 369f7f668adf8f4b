//! Utility usage aggregation
//!
//! Logs in to utility billing portals on behalf of many customers, scrapes
//! each account's balance and payment data, normalizes it into one record
//! shape and merges a whole batch into a single result.
//!
//! # Quick Start
//!
//! ```no_run
//! use utility_usage::{Credential, Provider, UsageAggregator, UsageOptions};
//!
//! #[tokio::main]
//! async fn main() -> utility_usage::Result<()> {
//!     let options = UsageOptions::builder()
//!         .token_client_secret("portal-client-secret")
//!         .build();
//!     let aggregator = UsageAggregator::new(options)?;
//!
//!     let credentials = vec![
//!         Credential::new("customer-1", Provider::Dpdc).with_password("secret"),
//!         Credential::new("77001234", Provider::Nesco),
//!     ];
//!
//!     let result = aggregator.get_usage_data(&credentials, false).await;
//!     for account in &result.accounts {
//!         println!("{} {}: {}", account.provider, account.account_id, account.balance_remaining);
//!     }
//!     for failure in &result.failed_logins {
//!         eprintln!("{} failed: {}", failure.username, failure.error);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod http;
pub mod core;
pub mod providers;
pub mod utils;

pub use types::{BatchResult, CacheEntry, Credential, FailedLogin, FetchOutcome, NormalizedAccount, Provider};

pub use error::{ErrorCode, ErrorSanitizationConfig, Result, UsageError};

pub use core::{
    skip_cache_from_header, CacheBackend, CacheOptions, CacheStore, Cacheable, MemoryCacheBackend,
    SessionPortalConfig, TokenPortalConfig, UsageAggregator, UsageOptions, UsageOptionsBuilder,
    SKIP_CACHE_HEADER,
};

pub use http::{fetch_with_retry, HttpClient, RetryConfig};

pub use providers::{ProviderClient, RawAccountFields, SessionPortalClient, TokenPortalClient};

pub use utils::normalize_date;
