//! Provider adapters.
//!
//! Each portal gets its own client with its own handshake. The only thing
//! they share is the [`ProviderClient`] contract: one call performs one full
//! attempt (handshake, fetch, extraction) and returns the provider's raw
//! fields. Retrying lives a layer above, in [`crate::http::retry`].

pub mod extract;
mod session_portal;
mod token_portal;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Credential, NormalizedAccount, Provider};
use crate::utils::normalize_date;

pub use session_portal::{SessionPortalClient, SessionPortalSession};
pub use token_portal::{parse_login_response, TokenPortalClient, TokenPortalSession};

#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Run a single attempt against the portal. Session state is created
    /// inside the call and dropped with it.
    async fn fetch_account(&self, credential: &Credential) -> Result<RawAccountFields>;

    /// Turn raw fields into normalized records.
    fn normalize(&self, raw: RawAccountFields) -> Vec<NormalizedAccount> {
        raw.into_accounts()
    }
}

/// Provider-native fields as extracted from a response body.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAccountFields {
    Token(TokenAccountList),
    Session(SessionAccountFields),
}

/// Sub-accounts read from the bearer-token portal's login response.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAccountList {
    pub accounts: Vec<TokenAccountFields>,
    /// Status code that means the connection is live.
    pub active_status_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenAccountFields {
    pub account_id: Option<String>,
    pub customer_number: Option<String>,
    pub customer_name: Option<String>,
    pub account_type: Option<String>,
    pub status_code: Option<String>,
    pub balance_remaining: Option<String>,
    pub balance_latest_date: Option<String>,
    pub last_payment_amount: Option<String>,
    pub last_payment_date: Option<String>,
    pub location: Option<String>,
    pub mobile_number: Option<String>,
    pub min_recharge: Option<String>,
}

/// Fields scraped from the legacy portal's account page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionAccountFields {
    pub customer_name: Option<String>,
    pub customer_number: Option<String>,
    pub meter_number: Option<String>,
    pub address: Option<String>,
    pub mobile_number: Option<String>,
    pub min_recharge: Option<String>,
    pub balance_remaining: Option<String>,
    pub balance_timestamp: Option<String>,
    pub last_recharge_amount: Option<String>,
    pub last_recharge_date: Option<String>,
}

pub const STATUS_ACTIVE: &str = "Active";
pub const STATUS_UNKNOWN: &str = "Unknown";
pub const ACCOUNT_TYPE_PREPAID: &str = "Prepaid";

/// Map a portal status code to a connection status. Only the active code is
/// translated; everything else is reported as the portal sent it.
pub fn connection_status(status_code: Option<&str>, active_status_code: &str) -> String {
    match status_code.map(str::trim) {
        Some(code) if code == active_status_code => STATUS_ACTIVE.to_string(),
        Some(code) => code.to_string(),
        None => String::new(),
    }
}

fn date_or_empty(raw: Option<String>) -> String {
    raw.map(|d| normalize_date(&d)).unwrap_or_default()
}

impl RawAccountFields {
    pub fn into_accounts(self) -> Vec<NormalizedAccount> {
        match self {
            RawAccountFields::Token(list) => {
                let active = list.active_status_code;
                list.accounts
                    .into_iter()
                    .map(|fields| fields.into_normalized(&active))
                    .collect()
            }
            RawAccountFields::Session(fields) => vec![fields.into_normalized()],
        }
    }
}

impl TokenAccountFields {
    pub fn into_normalized(self, active_status_code: &str) -> NormalizedAccount {
        let account_id = self
            .account_id
            .clone()
            .or_else(|| self.customer_number.clone())
            .unwrap_or_default();
        let customer_number = self
            .customer_number
            .clone()
            .unwrap_or_else(|| account_id.clone());

        NormalizedAccount {
            account_id,
            customer_number,
            customer_name: self.customer_name.unwrap_or_default(),
            provider: Provider::Dpdc,
            account_type: self.account_type.unwrap_or_default(),
            balance_remaining: self.balance_remaining.unwrap_or_default(),
            connection_status: connection_status(self.status_code.as_deref(), active_status_code),
            last_payment_amount: self.last_payment_amount.unwrap_or_default(),
            last_payment_date: date_or_empty(self.last_payment_date),
            balance_latest_date: date_or_empty(self.balance_latest_date),
            location: self.location.unwrap_or_default(),
            mobile_number: self.mobile_number.unwrap_or_default(),
            min_recharge: self.min_recharge,
        }
    }
}

impl SessionAccountFields {
    pub fn into_normalized(self) -> NormalizedAccount {
        let account_id = self
            .meter_number
            .clone()
            .or_else(|| self.customer_number.clone())
            .unwrap_or_default();
        let customer_number = self
            .customer_number
            .clone()
            .unwrap_or_else(|| account_id.clone());

        NormalizedAccount {
            account_id,
            customer_number,
            customer_name: self.customer_name.unwrap_or_default(),
            provider: Provider::Nesco,
            account_type: ACCOUNT_TYPE_PREPAID.to_string(),
            balance_remaining: self.balance_remaining.unwrap_or_default(),
            connection_status: STATUS_UNKNOWN.to_string(),
            last_payment_amount: self.last_recharge_amount.unwrap_or_default(),
            last_payment_date: date_or_empty(self.last_recharge_date),
            balance_latest_date: date_or_empty(self.balance_timestamp),
            location: self.address.unwrap_or_default(),
            mobile_number: self.mobile_number.unwrap_or_default(),
            min_recharge: self.min_recharge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_mapping() {
        assert_eq!(connection_status(Some("02"), "02"), "Active");
        assert_eq!(connection_status(Some("05"), "02"), "05");
        assert_eq!(connection_status(None, "02"), "");
    }

    #[test]
    fn test_session_fields_prefer_meter_as_account_id() {
        let fields = SessionAccountFields {
            customer_number: Some("77001234".to_string()),
            meter_number: Some("31041009876".to_string()),
            balance_timestamp: Some("24 October 2025 12:34:56 PM".to_string()),
            ..Default::default()
        };
        let accounts = RawAccountFields::Session(fields).into_accounts();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_id, "31041009876");
        assert_eq!(accounts[0].customer_number, "77001234");
        assert_eq!(accounts[0].balance_latest_date, "2025-10-24");
        assert_eq!(accounts[0].provider, Provider::Nesco);
    }

    #[test]
    fn test_token_fields_fall_back_to_customer_number() {
        let fields = TokenAccountFields {
            customer_number: Some("C-1".to_string()),
            status_code: Some("02".to_string()),
            last_payment_date: Some("24-OCT-2025 12:34 PM".to_string()),
            ..Default::default()
        };
        let account = fields.into_normalized("02");

        assert_eq!(account.account_id, "C-1");
        assert_eq!(account.connection_status, "Active");
        assert_eq!(account.last_payment_date, "2025-10-24");
        assert!(account.min_recharge.is_none());
    }

    #[test]
    fn test_empty_token_list_normalizes_to_nothing() {
        let raw = RawAccountFields::Token(TokenAccountList {
            accounts: Vec::new(),
            active_status_code: "02".to_string(),
        });
        assert!(raw.into_accounts().is_empty());
    }
}
