mod client;
pub mod retry;

pub use client::{status_to_error, HttpClient, PortalResponse, USER_AGENT};
pub use retry::{
    fetch_with_retry, with_retry_detailed, RetryConfig, RetryConfigBuilder, RetryResult,
};
