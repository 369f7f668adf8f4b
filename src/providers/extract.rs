//! Field extractors for the legacy portal's account page.
//!
//! The page has no stable structure beyond label text sitting next to a
//! read-only input, so each field is found by pattern search over the raw
//! markup. Every extractor is a pure `&str -> Option<String>` function and
//! can be checked on its own against a saved page when the markup drifts.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::SessionAccountFields;
use crate::error::{ErrorCode, Result, UsageError};

pub const LABEL_CUSTOMER_NAME: &str = "Customer Name";
pub const LABEL_CUSTOMER_NUMBER: &str = "Consumer No";
pub const LABEL_METER_NUMBER: &str = "Meter No";
pub const LABEL_ADDRESS: &str = "Address";
pub const LABEL_MOBILE: &str = "Mobile";
pub const LABEL_MIN_RECHARGE: &str = "Minimum Recharge";
pub const LABEL_BALANCE: &str = "Remaining Balance";

pub const RECHARGE_TABLE_CLASS: &str = "recharge-history";
pub const RECHARGE_AMOUNT_COLUMN: usize = 3;
pub const RECHARGE_DATE_COLUMN: usize = 5;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("valid row pattern"));
static CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("valid cell pattern"));
static TBODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tbody\b[^>]*>(.*?)</tbody>").expect("valid tbody pattern"));
static RECHARGE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?is)<table\b[^>]*class\s*=\s*["'][^"']*\b{}\b[^"']*["'][^>]*>(.*?)</table>"#,
        regex::escape(RECHARGE_TABLE_CLASS)
    ))
    .expect("valid recharge table pattern")
});
static FIELD_LABELS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    [
        LABEL_CUSTOMER_NAME,
        LABEL_CUSTOMER_NUMBER,
        LABEL_METER_NUMBER,
        LABEL_ADDRESS,
        LABEL_MOBILE,
        LABEL_MIN_RECHARGE,
        LABEL_BALANCE,
    ]
    .into_iter()
    .map(|label| (label, Regex::new(&label_pattern(label)).expect("valid label pattern")))
    .collect()
});
static INPUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("valid input pattern"));
static LABEL_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<label\b").expect("valid label open pattern"));
static VALUE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)(?:^|\s)value\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid value pattern")
});
static TRAILING_NOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*<(?:span|small|p|div)\b[^>]*>(.*?)</(?:span|small|p|div)>")
        .expect("valid trailing note pattern")
});
static TIMESTAMP_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:as\s+(?:of|on)|updated(?:\s+at)?|last\s+updated)\s*:?\s*")
        .expect("valid timestamp prefix pattern")
});

/// Decode the handful of entities the portal emits.
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Strip tags, decode entities and collapse whitespace.
pub fn clean_text(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    WHITESPACE.replace_all(decoded.trim(), " ").to_string()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn label_pattern(label: &str) -> String {
    format!(r"(?is)<label\b[^>]*>\s*{}[^<]*</label>", regex::escape(label))
}

/// Byte offset just past the `<label>` whose text starts with `label`.
fn label_end(html: &str, label: &str) -> Option<usize> {
    match FIELD_LABELS.get(label) {
        Some(re) => re.find(html).map(|m| m.end()),
        None => Regex::new(&label_pattern(label)).ok()?.find(html).map(|m| m.end()),
    }
}

/// Attributes of the `<input>` belonging to `label`, and the offset just
/// past that tag. The input must come before the next `<label>`.
fn field_input<'a>(html: &'a str, label: &str) -> Option<(&'a str, usize)> {
    let start = label_end(html, label)?;
    let rest = &html[start..];
    let input = INPUT.captures(rest)?;
    let tag = input.get(0)?;

    if let Some(next_label) = LABEL_OPEN.find(rest) {
        if next_label.start() < tag.start() {
            return None;
        }
    }

    Some((input.get(1)?.as_str(), start + tag.end()))
}

/// Value of the input following the `<label>` whose text starts with
/// `label`. `None` when that input has no value attribute, even if a later
/// field's input does.
pub fn extract_labeled_value(html: &str, label: &str) -> Option<String> {
    let (attrs, _) = field_input(html, label)?;
    let caps = VALUE_ATTR.captures(attrs)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    non_empty(clean_text(raw))
}

/// Text of the element right after the balance input, with any
/// "as of"-style prefix and wrapping parentheses removed.
pub fn extract_balance_timestamp(html: &str) -> Option<String> {
    let (_, end) = field_input(html, LABEL_BALANCE)?;
    let caps = TRAILING_NOTE.captures(&html[end..])?;
    let text = clean_text(caps.get(1)?.as_str());
    let text = text.trim_matches(&['(', ')'][..]).trim();
    let text = TIMESTAMP_PREFIX.replace(text, "");
    non_empty(text.trim().to_string())
}

/// Cells of the first data row of the recharge history table.
pub fn extract_first_recharge_row(html: &str) -> Option<Vec<String>> {
    let table = RECHARGE_TABLE.captures(html)?.get(1)?.as_str();
    let body = TBODY
        .captures(table)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(table);

    ROW.captures_iter(body).find_map(|row| {
        let cells: Vec<String> = CELL
            .captures_iter(row.get(1)?.as_str())
            .filter_map(|c| c.get(1).map(|m| clean_text(m.as_str())))
            .collect();
        if cells.is_empty() {
            None
        } else {
            Some(cells)
        }
    })
}

/// Amount and date of the most recent recharge, when the table has them.
pub fn extract_latest_recharge(html: &str) -> (Option<String>, Option<String>) {
    match extract_first_recharge_row(html) {
        Some(cells) => (
            cells.get(RECHARGE_AMOUNT_COLUMN).cloned().and_then(non_empty),
            cells.get(RECHARGE_DATE_COLUMN).cloned().and_then(non_empty),
        ),
        None => (None, None),
    }
}

/// Scrape every known field from an account page.
///
/// Fails only when neither the customer number nor the meter number can be
/// found, since without one the record cannot be identified.
pub fn parse_account_page(html: &str) -> Result<SessionAccountFields> {
    let (last_recharge_amount, last_recharge_date) = extract_latest_recharge(html);

    let fields = SessionAccountFields {
        customer_name: extract_labeled_value(html, LABEL_CUSTOMER_NAME),
        customer_number: extract_labeled_value(html, LABEL_CUSTOMER_NUMBER),
        meter_number: extract_labeled_value(html, LABEL_METER_NUMBER),
        address: extract_labeled_value(html, LABEL_ADDRESS),
        mobile_number: extract_labeled_value(html, LABEL_MOBILE),
        min_recharge: extract_labeled_value(html, LABEL_MIN_RECHARGE),
        balance_remaining: extract_labeled_value(html, LABEL_BALANCE),
        balance_timestamp: extract_balance_timestamp(html),
        last_recharge_amount,
        last_recharge_date,
    };

    if fields.customer_number.is_none() && fields.meter_number.is_none() {
        return Err(UsageError::parse_error(
            ErrorCode::ParseMissingIdentifier,
            "Neither customer number nor meter number found on account page",
        ));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  <b>Md.&nbsp;Rahim</b>\n  Uddin "), "Md. Rahim Uddin");
        assert_eq!(clean_text("A &amp; B"), "A & B");
    }

    #[test]
    fn test_labeled_value_single_quotes() {
        let html = "<label>Meter No :</label><input type='text' value='310410' readonly>";
        assert_eq!(extract_labeled_value(html, LABEL_METER_NUMBER).as_deref(), Some("310410"));
    }

    #[test]
    fn test_labeled_value_empty_is_none() {
        let html = r#"<label>Mobile</label><input value="">"#;
        assert_eq!(extract_labeled_value(html, LABEL_MOBILE), None);
    }

    #[test]
    fn test_value_never_taken_from_next_field() {
        let html = concat!(
            r#"<label>Mobile :</label><input type="text" readonly>"#,
            r#"<label>Minimum Recharge :</label><input value="100">"#,
        );
        assert_eq!(extract_labeled_value(html, LABEL_MOBILE), None);
        assert_eq!(extract_labeled_value(html, LABEL_MIN_RECHARGE).as_deref(), Some("100"));
    }

    #[test]
    fn test_data_value_attribute_ignored() {
        let html = r#"<label>Address</label><input data-value="stale" value="Sector 7">"#;
        assert_eq!(extract_labeled_value(html, LABEL_ADDRESS).as_deref(), Some("Sector 7"));
    }

    #[test]
    fn test_unlisted_label_still_found() {
        let html = r#"<label>Tariff :</label><input value="LT-A">"#;
        assert_eq!(extract_labeled_value(html, "Tariff").as_deref(), Some("LT-A"));
    }

    #[test]
    fn test_balance_timestamp_needs_balance_input() {
        let html = concat!(
            "<label>Remaining Balance :</label>",
            "<label>Mobile</label><input value=\"017\"><span>(As of 1 May 2025)</span>",
        );
        assert_eq!(extract_balance_timestamp(html), None);
    }

    #[test]
    fn test_missing_label_is_none() {
        assert_eq!(extract_labeled_value("<p>nothing</p>", LABEL_ADDRESS), None);
    }

    #[test]
    fn test_missing_identifiers_fail() {
        let html = r#"<label>Customer Name</label><input value="Rahim">"#;
        let err = parse_account_page(html).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseMissingIdentifier);
    }
}
