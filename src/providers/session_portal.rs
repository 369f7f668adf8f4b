use async_trait::async_trait;

use super::extract::parse_account_page;
use super::{ProviderClient, RawAccountFields};
use crate::core::SessionPortalConfig;
use crate::error::{ErrorCode, Result, UsageError};
use crate::http::HttpClient;
use crate::types::{Credential, Provider};

const PANEL_PATH: &str = "/pre/panel";
const SUBMIT_VALUE: &str = "Recharge History";

/// Per-attempt state for the legacy portal: the operator-provisioned cookie
/// and CSRF token pair.
#[derive(Debug, Clone)]
pub struct SessionPortalSession {
    pub cookie: String,
    pub csrf_token: String,
}

impl SessionPortalSession {
    pub fn from_config(config: &SessionPortalConfig) -> Result<Self> {
        let cookie = config
            .session_cookie
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                UsageError::config_error(
                    ErrorCode::ConfigMissingSessionToken,
                    format!("No session cookie configured for {}", Provider::Nesco),
                )
            })?;
        let csrf_token = config
            .csrf_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                UsageError::config_error(
                    ErrorCode::ConfigMissingSessionToken,
                    format!("No CSRF token configured for {}", Provider::Nesco),
                )
            })?;

        Ok(Self {
            cookie: cookie.to_string(),
            csrf_token: csrf_token.to_string(),
        })
    }
}

/// Client for the server-rendered portal driven by form posts.
pub struct SessionPortalClient {
    http: HttpClient,
    config: SessionPortalConfig,
}

impl SessionPortalClient {
    pub fn new(http: HttpClient, config: SessionPortalConfig) -> Self {
        Self { http, config }
    }

    fn panel_url(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), PANEL_PATH)
    }
}

#[async_trait]
impl ProviderClient for SessionPortalClient {
    fn provider(&self) -> Provider {
        Provider::Nesco
    }

    async fn fetch_account(&self, credential: &Credential) -> Result<RawAccountFields> {
        let customer_number = credential.username.trim();
        if customer_number.is_empty() {
            return Err(UsageError::auth_error(
                ErrorCode::AuthMissingCredential,
                "Customer number is required",
            ));
        }

        let session = SessionPortalSession::from_config(&self.config)?;
        let url = self.panel_url();

        tracing::debug!("Submitting account form for {} to {}", customer_number, Provider::Nesco);

        let headers = [
            ("Cookie", session.cookie.clone()),
            ("X-CSRF-TOKEN", session.csrf_token.clone()),
            ("Accept", "text/html,application/xhtml+xml".to_string()),
            ("Origin", self.config.base_url.trim_end_matches('/').to_string()),
            ("Referer", url.clone()),
        ];
        let form = [
            ("_token", session.csrf_token.as_str()),
            ("cust_no", customer_number),
            ("submit", SUBMIT_VALUE),
        ];

        let response = self
            .http
            .post_form(&url, &headers, &form)
            .await?
            .error_for_status()?;

        if !response.is_html() {
            return Err(UsageError::network_error(
                ErrorCode::HttpUnexpectedContentType,
                format!(
                    "Expected text/html, got {}",
                    response.content_type.as_deref().unwrap_or("no content type")
                ),
            ));
        }

        let fields = parse_account_page(&response.body)?;
        Ok(RawAccountFields::Session(fields))
    }
}
