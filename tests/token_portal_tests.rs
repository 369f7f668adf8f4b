use serde_json::json;

use utility_usage::providers::parse_login_response;
use utility_usage::{ErrorCode, Provider, RawAccountFields};

fn login_body(accounts: serde_json::Value) -> String {
    json!({
        "accountDetails": {
            "accountSummary": {
                "personAcccountDetail": { "personAccountList": accounts }
            }
        }
    })
    .to_string()
}

#[test]
fn test_every_sub_account_is_normalized() {
    let body = login_body(json!([
        {
            "accountId": "1020304",
            "customerNumber": "C-100",
            "customerName": "Karim Ahmed",
            "accountType": "Prepaid",
            "accountStatusCode": "02",
            "location": "Dhanmondi",
            "minRecharge": 200,
            "prepaidBalance": {
                "balanceRemaining": "532.18",
                "balanceLatestDate": "24-OCT-2025 12:34 PM",
                "lastPaymentAmount": "1000",
                "lastPaymentDate": "2025-10-20T10:05:00.000+06:00"
            },
            "contactDetails": [{ "contactType": "TNTMOBILE", "contactValue": "01711000000" }]
        },
        {
            "accountId": "1020305",
            "customerNumber": "C-101",
            "accountStatusCode": "05"
        }
    ]));

    let list = parse_login_response(&body, "02").unwrap();
    let accounts = RawAccountFields::Token(list).into_accounts();

    assert_eq!(accounts.len(), 2);

    let first = &accounts[0];
    assert_eq!(first.provider, Provider::Dpdc);
    assert_eq!(first.account_id, "1020304");
    assert_eq!(first.customer_number, "C-100");
    assert_eq!(first.customer_name, "Karim Ahmed");
    assert_eq!(first.connection_status, "Active");
    assert_eq!(first.balance_remaining, "532.18");
    assert_eq!(first.balance_latest_date, "2025-10-24");
    assert_eq!(first.last_payment_amount, "1000");
    assert_eq!(first.last_payment_date, "2025-10-20");
    assert_eq!(first.location, "Dhanmondi");
    assert_eq!(first.mobile_number, "01711000000");
    assert_eq!(first.min_recharge.as_deref(), Some("200"));

    let second = &accounts[1];
    assert_eq!(second.connection_status, "05");
    assert_eq!(second.balance_remaining, "");
    assert!(second.min_recharge.is_none());
}

#[test]
fn test_configurable_active_code() {
    let body = login_body(json!([{ "accountId": "1", "accountStatusCode": "A" }]));
    let accounts = RawAccountFields::Token(parse_login_response(&body, "A").unwrap()).into_accounts();
    assert_eq!(accounts[0].connection_status, "Active");
}

#[test]
fn test_missing_account_path_is_no_accounts() {
    let body = json!({ "accountDetails": { "accountSummary": {} } }).to_string();
    let err = parse_login_response(&body, "02").unwrap_err();
    assert_eq!(err.code, ErrorCode::ParseNoAccounts);
    assert!(err.is_retryable());
}

#[test]
fn test_error_page_instead_of_json() {
    let err = parse_login_response("<html><body>502 Bad Gateway</body></html>", "02").unwrap_err();
    assert_eq!(err.code, ErrorCode::ParseInvalidJson);
}
