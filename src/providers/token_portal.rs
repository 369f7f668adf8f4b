use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};

use super::{ProviderClient, RawAccountFields, TokenAccountFields, TokenAccountList};
use crate::core::TokenPortalConfig;
use crate::error::{ErrorCode, Result, UsageError};
use crate::http::HttpClient;
use crate::types::{Credential, Provider};

const TOKEN_PATH: &str = "/auth/login/generate-bearer";
const LOGIN_PATH: &str = "/auth/login/user-login";
const ACCOUNT_LIST_POINTER: &str =
    "/accountDetails/accountSummary/personAcccountDetail/personAccountList";
const MOBILE_CONTACT_TYPE: &str = "TNTMOBILE";
const SESSION_COOKIE_NAME: &str = "JSESSIONID";
const SESSION_COOKIE_LEN: usize = 32;

/// Per-attempt handshake state for the bearer-token portal.
#[derive(Debug)]
pub struct TokenPortalSession {
    pub cookie: String,
    pub bearer_token: Option<String>,
}

impl TokenPortalSession {
    /// A fresh session with a random cookie, so concurrent logins never share
    /// one upstream session.
    pub fn fresh() -> Self {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_COOKIE_LEN)
            .map(char::from)
            .collect();
        Self {
            cookie: format!("{}={}", SESSION_COOKIE_NAME, value),
            bearer_token: None,
        }
    }
}

/// Client for the REST-style portal that issues bearer tokens.
pub struct TokenPortalClient {
    http: HttpClient,
    config: TokenPortalConfig,
}

impl TokenPortalClient {
    pub fn new(http: HttpClient, config: TokenPortalConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn client_secret<'a>(&'a self, credential: &'a Credential) -> Result<&'a str> {
        credential
            .client_secret
            .as_deref()
            .or(self.config.client_secret.as_deref())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                UsageError::config_error(
                    ErrorCode::ConfigMissingClientSecret,
                    format!("No client secret configured for {}", Provider::Dpdc),
                )
            })
    }

    async fn request_token(&self, session: &mut TokenPortalSession, secret: &str) -> Result<()> {
        tracing::debug!("Requesting bearer token from {}", Provider::Dpdc);

        let headers = [
            ("clientId", self.config.client_id.clone()),
            ("clientSecret", secret.to_string()),
            ("tenantCode", self.config.tenant_code.clone()),
            ("Accept", "application/json".to_string()),
            ("Cookie", session.cookie.clone()),
        ];
        let response = self
            .http
            .post_json(&self.url(TOKEN_PATH), &headers, &json!({ "grant_type": "password" }))
            .await?
            .error_for_status()?;

        let token = parse_token_response(&response.body)?;
        session.bearer_token = Some(token);
        Ok(())
    }

    async fn login(
        &self,
        session: &TokenPortalSession,
        username: &str,
        password: &str,
    ) -> Result<TokenAccountList> {
        let token = session.bearer_token.as_deref().ok_or_else(|| {
            UsageError::auth_error(ErrorCode::AuthTokenRejected, "Login attempted without a token")
        })?;

        tracing::debug!("Logging in {} to {}", username, Provider::Dpdc);

        let headers = [
            ("Authorization", format!("Bearer {}", token)),
            ("tenantCode", self.config.tenant_code.clone()),
            ("Accept", "application/json".to_string()),
            ("Cookie", session.cookie.clone()),
        ];
        let body = json!({ "userName": username, "password": password });
        let response = self
            .http
            .post_json(&self.url(LOGIN_PATH), &headers, &body)
            .await?
            .error_for_status()
            .map_err(|e| {
                UsageError::auth_error(ErrorCode::AuthLoginFailed, format!("Login failed: {}", e))
            })?;

        parse_login_response(&response.body, &self.config.active_status_code)
    }
}

#[async_trait]
impl ProviderClient for TokenPortalClient {
    fn provider(&self) -> Provider {
        Provider::Dpdc
    }

    async fn fetch_account(&self, credential: &Credential) -> Result<RawAccountFields> {
        let password = credential
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                UsageError::auth_error(
                    ErrorCode::AuthMissingCredential,
                    format!("Password is required for {}", Provider::Dpdc),
                )
            })?;
        if credential.username.trim().is_empty() {
            return Err(UsageError::auth_error(
                ErrorCode::AuthMissingCredential,
                "Username is required",
            ));
        }
        let secret = self.client_secret(credential)?;

        let mut session = TokenPortalSession::fresh();
        self.request_token(&mut session, secret).await?;
        let list = self.login(&session, &credential.username, password).await?;

        Ok(RawAccountFields::Token(list))
    }
}

fn parse_json_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Err(UsageError::parse_error(ErrorCode::ParseEmptyBody, "Empty response body"));
    }

    let value: Value = serde_json::from_str(body).map_err(|e| {
        UsageError::with_source(ErrorCode::ParseInvalidJson, "Response is not valid JSON", e)
    })?;

    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(UsageError::parse_error(ErrorCode::ParseEmptyBody, "Empty JSON response"));
    }

    Ok(value)
}

fn parse_token_response(body: &str) -> Result<String> {
    let value = parse_json_body(body)?;
    string_field(&value, &["access_token", "accessToken"]).ok_or_else(|| {
        UsageError::auth_error(ErrorCode::AuthTokenRejected, "Token response carried no access token")
    })
}

/// Extract every sub-account from a login response body.
///
/// An empty or missing account list is an error, not an empty success.
pub fn parse_login_response(body: &str, active_status_code: &str) -> Result<TokenAccountList> {
    let value = parse_json_body(body)?;

    let items = value
        .pointer(ACCOUNT_LIST_POINTER)
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| {
            UsageError::parse_error(ErrorCode::ParseNoAccounts, "no account information found")
        })?;

    Ok(TokenAccountList {
        accounts: items.iter().map(account_fields).collect(),
        active_status_code: active_status_code.to_string(),
    })
}

fn account_fields(item: &Value) -> TokenAccountFields {
    let prepaid = item.get("prepaidBalance").filter(|v| v.is_object());
    let balance_field = |key: &str| {
        prepaid
            .and_then(|p| string_field(p, &[key]))
            .or_else(|| string_field(item, &[key]))
    };

    TokenAccountFields {
        account_id: string_field(item, &["accountId"]),
        customer_number: string_field(item, &["customerNumber"]),
        customer_name: string_field(item, &["customerName"]),
        account_type: string_field(item, &["accountType"]),
        status_code: string_field(item, &["accountStatusCode"]),
        balance_remaining: balance_field("balanceRemaining"),
        balance_latest_date: balance_field("balanceLatestDate"),
        last_payment_amount: balance_field("lastPaymentAmount"),
        last_payment_date: balance_field("lastPaymentDate"),
        location: string_field(item, &["location", "premiseAddress"]),
        mobile_number: mobile_number(item),
        min_recharge: string_field(item, &["minRecharge"]),
    }
}

fn mobile_number(item: &Value) -> Option<String> {
    item.get("contactDetails")?
        .as_array()?
        .iter()
        .find(|contact| {
            contact
                .get("contactType")
                .and_then(Value::as_str)
                .map(|t| t.eq_ignore_ascii_case(MOBILE_CONTACT_TYPE))
                .unwrap_or(false)
        })
        .and_then(|contact| string_field(contact, &["contactValue"]))
}

/// First present key as a trimmed, non-empty string. Numbers are rendered
/// as-is so balances keep the portal's precision.
fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}
