//! Constants and environment-variable overrides.
//!
//! There is no config file; every tunable has a compiled-in default that an
//! environment variable (and then a CLI flag) can override.

use std::str::FromStr;
use std::time::Duration;

/// Default log filter when neither `--log-level` nor `RUST_LOG` is set.
/// Per-request HTTP tracing stays off unless asked for.
pub const DEFAULT_LOG_FILTER: &str = "geoprobe=info,tower_http=warn";

/// Interface both health responders bind to.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

// =============================================================================
// Health responders
// =============================================================================

/// Port variable for the framework responder.
pub const FRAMEWORK_PORT_ENV: &str = "HTTP_PORT";
pub const DEFAULT_FRAMEWORK_PORT: u16 = 8080;

/// Port variable for the raw-socket responder.
pub const RAW_PORT_ENV: &str = "PORT";
pub const DEFAULT_RAW_PORT: u16 = 10000;

/// Bytes read from a client before the raw responder classifies the request.
pub const RAW_READ_LIMIT: usize = 1024;

/// Pause after a failed `accept()` before trying again.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

// =============================================================================
// Geolocation
// =============================================================================

/// Per-provider request timeout variable (whole seconds).
pub const PROVIDER_TIMEOUT_ENV: &str = "GEOPROBE_TIMEOUT_SECS";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 5;

/// Read `key` from the process environment, falling back to `default` when
/// unset or unparsable.
pub fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    parse_or(key, std::env::var(key).ok(), default)
}

/// Parse an optional raw value, warning and using `default` when it is invalid.
pub fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value, %default, "invalid value in environment, using default");
            default
        }),
    }
}

/// Port for the framework responder from `HTTP_PORT`.
pub fn framework_port() -> u16 {
    env_or(FRAMEWORK_PORT_ENV, DEFAULT_FRAMEWORK_PORT)
}

/// Port for the raw responder from `PORT`.
pub fn raw_port() -> u16 {
    env_or(RAW_PORT_ENV, DEFAULT_RAW_PORT)
}

/// Provider timeout from `GEOPROBE_TIMEOUT_SECS`.
pub fn provider_timeout() -> Duration {
    let secs = env_or(PROVIDER_TIMEOUT_ENV, DEFAULT_PROVIDER_TIMEOUT_SECS);
    timeout_from_secs(PROVIDER_TIMEOUT_ENV, secs)
}

/// A zero timeout would fail every request at once, so it is rejected in
/// favour of the default.
pub fn timeout_from_secs(key: &str, secs: u64) -> Duration {
    if secs == 0 {
        tracing::warn!(
            key,
            default = DEFAULT_PROVIDER_TIMEOUT_SECS,
            "provider timeout must be positive, using default"
        );
        return Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS);
    }
    Duration::from_secs(secs)
}
