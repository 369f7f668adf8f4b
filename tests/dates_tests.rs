use utility_usage::utils::{normalize_date, parse_provider_date};

const SAMPLES: &[&str] = &[
    "24 October 2025 12:34:56 PM",
    "24-OCT-2025 12:34 PM",
    "2025-10-24T08:15:00.000+06:00",
    "2025-10-24",
    "3 Sept 2024",
    "07/Mar/2023",
    "yesterday",
    "",
    "31 February 2025",
];

#[test]
fn test_provider_formats_agree() {
    for raw in ["24 October 2025 12:34:56 PM", "24-OCT-2025 12:34 PM", "2025-10-24T08:15:00Z"] {
        assert_eq!(normalize_date(raw), "2025-10-24", "input {:?}", raw);
    }
}

#[test]
fn test_normalization_is_idempotent() {
    for raw in SAMPLES {
        let once = normalize_date(raw);
        assert_eq!(normalize_date(&once), once, "input {:?}", raw);
    }
}

#[test]
fn test_unparsable_input_is_returned_unchanged() {
    assert_eq!(normalize_date("yesterday"), "yesterday");
    assert_eq!(normalize_date(""), "");
    assert_eq!(normalize_date("N/A"), "N/A");
}

#[test]
fn test_parse_rejects_impossible_dates() {
    assert!(parse_provider_date("31 February 2025").is_none());
    assert!(parse_provider_date("29 Feb 2023").is_none());
    assert!(parse_provider_date("29 Feb 2024").is_some());
}
