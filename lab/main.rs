//! Usage Lab
//!
//! Runs one batch against the live portals and prints the merged result.
//!
//! ```text
//! usage-lab <credentials.json> [--skip-cache]
//! ```
//!
//! The credentials file holds a JSON array of
//! `{"username", "password", "clientSecret", "provider"}` objects. Portal
//! settings come from `USAGE_*` environment variables; log verbosity from
//! `RUST_LOG`.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use utility_usage::{Credential, UsageAggregator, UsageOptions};

const USAGE: &str = "usage: usage-lab <credentials.json> [--skip-cache]";

struct Args {
    credentials_path: String,
    skip_cache: bool,
}

fn parse_args() -> Option<Args> {
    let mut credentials_path = None;
    let mut skip_cache = false;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--skip-cache" => skip_cache = true,
            "-h" | "--help" => return None,
            other if credentials_path.is_none() && !other.starts_with('-') => {
                credentials_path = Some(other.to_string())
            }
            _ => return None,
        }
    }

    Some(Args {
        credentials_path: credentials_path?,
        skip_cache,
    })
}

fn load_credentials(path: &str) -> Result<Vec<Credential>, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path, e))?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid credentials in {}: {}", path, e))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(args) = parse_args() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let credentials = match load_credentials(&args.credentials_path) {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let aggregator = match UsageOptions::from_env().and_then(UsageAggregator::new) {
        Ok(aggregator) => aggregator,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    let result = aggregator.get_usage_data(&credentials, args.skip_cache).await;

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("cannot encode result: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
