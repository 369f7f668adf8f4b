use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::error::{ErrorCode, Result, UsageError};

pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// A fully read upstream response.
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl PortalResponse {
    /// Fail unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(status_to_error(self.status, &self.body))
        }
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
    }
}

/// Shared HTTP client for the provider portals.
///
/// Every request carries the configured timeout so an unresponsive portal
/// cannot stall a batch. No cookie jar is kept: session state is sent
/// explicitly per request by the provider clients.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                UsageError::with_source(ErrorCode::NetworkError, "Failed to create HTTP client", e)
            })?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
    ) -> Result<PortalResponse> {
        let request = self.client.post(url).json(body);
        self.send(with_headers(request, headers)).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        headers: &[(&str, String)],
        form: &[(&str, &str)],
    ) -> Result<PortalResponse> {
        let request = self.client.post(url).form(form);
        self.send(with_headers(request, headers)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<PortalResponse> {
        let response = request.send().await.map_err(convert_error)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|e| {
            UsageError::with_source(ErrorCode::HttpInvalidResponse, "Failed to read response", e)
        })?;

        Ok(PortalResponse {
            status,
            content_type,
            body,
        })
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(&str, String)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, value.as_str());
    }
    request
}

/// Map a non-2xx status to an error code. The body is truncated since
/// portals answer failures with full HTML pages.
pub fn status_to_error(status: StatusCode, body: &str) -> UsageError {
    let (code, category) = match status {
        StatusCode::BAD_REQUEST => (ErrorCode::HttpBadRequest, "Client Error"),
        StatusCode::UNAUTHORIZED => (ErrorCode::HttpUnauthorized, "Authentication Error"),
        StatusCode::FORBIDDEN => (ErrorCode::HttpForbidden, "Authorization Error"),
        StatusCode::NOT_FOUND => (ErrorCode::HttpNotFound, "Not Found"),
        StatusCode::TOO_MANY_REQUESTS => (ErrorCode::HttpRateLimited, "Rate Limited"),
        s if s.is_server_error() => (ErrorCode::HttpServerError, "Server Error"),
        s if s.is_client_error() => (ErrorCode::HttpBadRequest, "Client Error"),
        _ => (ErrorCode::HttpInvalidResponse, "Unexpected Status"),
    };

    let excerpt: String = body.trim().chars().take(200).collect();
    UsageError::network_error(code, format!("{}: {} - {}", category, status.as_u16(), excerpt))
}

fn convert_error(error: reqwest::Error) -> UsageError {
    if error.is_timeout() {
        UsageError::with_source(ErrorCode::HttpTimeout, "Request timed out", error)
    } else if error.is_connect() {
        UsageError::with_source(ErrorCode::HttpNetworkError, "Connection failed", error)
    } else {
        UsageError::with_source(ErrorCode::NetworkError, error.to_string(), error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_to_error_codes() {
        assert_eq!(
            status_to_error(StatusCode::UNAUTHORIZED, "").code,
            ErrorCode::HttpUnauthorized
        );
        assert_eq!(
            status_to_error(StatusCode::BAD_GATEWAY, "").code,
            ErrorCode::HttpServerError
        );
        assert_eq!(
            status_to_error(StatusCode::IM_A_TEAPOT, "").code,
            ErrorCode::HttpBadRequest
        );
    }

    #[test]
    fn test_status_error_truncates_body() {
        let body = "x".repeat(1000);
        let error = status_to_error(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(error.message.len() < 300);
    }

    #[test]
    fn test_is_html() {
        let response = PortalResponse {
            status: StatusCode::OK,
            content_type: Some("text/html; charset=UTF-8".to_string()),
            body: String::new(),
        };
        assert!(response.is_html());

        let json = PortalResponse {
            content_type: Some("application/json".to_string()),
            ..response
        };
        assert!(!json.is_html());
    }

    #[test]
    fn test_error_for_status_passes_success() {
        let response = PortalResponse {
            status: StatusCode::OK,
            content_type: None,
            body: "{}".to_string(),
        };
        assert!(response.error_for_status().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_portal_is_network_error() {
        let client = HttpClient::new(Duration::from_secs(2)).unwrap();
        let err = client
            .post_form("http://127.0.0.1:1/pre/panel", &[], &[("cust_no", "1")])
            .await
            .unwrap_err();
        assert!(matches!(
            err.code,
            ErrorCode::HttpNetworkError | ErrorCode::HttpTimeout | ErrorCode::NetworkError
        ));
        assert!(err.is_retryable());
    }
}
