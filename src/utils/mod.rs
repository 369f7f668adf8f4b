//! Utility modules shared by the provider clients.

pub mod dates;

pub use dates::{month_number, normalize_date, parse_provider_date};
