//! Core types for the geolocation subsystem.

use std::fmt;

/// Country sentinel for unknown or malformed codes.
pub const UNKNOWN_COUNTRY: &str = "XX";
/// Region sentinel.
pub const UNKNOWN_REGION: &str = "UnknownRegion";
/// Operator sentinel.
pub const UNKNOWN_ORG: &str = "UnknownProvider";

/// Maximum length of an error message in a diagnostic line.
pub const ERROR_TRUNCATE_CHARS: usize = 100;

/// Where a record came from. Diagnostic only; never part of the wire line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoSource {
    Provider(&'static str),
    Fallback,
}

impl fmt::Display for GeoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(name) => write!(f, "{}", name),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Country, region and network operator for the caller's public IP.
///
/// Fields are private so a record cannot change after construction; the
/// constructor is the only place sentinels and country normalization are
/// applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoRecord {
    country: String,
    region: String,
    org: String,
    source: GeoSource,
}

impl GeoRecord {
    /// Build a record from mapped provider fields, filling sentinels and
    /// normalizing the country code.
    pub fn new(
        country: Option<&str>,
        region: Option<&str>,
        org: Option<&str>,
        source: GeoSource,
    ) -> Self {
        Self {
            country: normalize_country(country.unwrap_or(UNKNOWN_COUNTRY)),
            region: non_empty_or(region, UNKNOWN_REGION),
            org: non_empty_or(org, UNKNOWN_ORG),
            source,
        }
    }

    /// The record returned when every provider fails.
    pub fn fallback() -> Self {
        Self {
            country: UNKNOWN_COUNTRY.into(),
            region: UNKNOWN_REGION.into(),
            org: UNKNOWN_ORG.into(),
            source: GeoSource::Fallback,
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn source(&self) -> &GeoSource {
        &self.source
    }

    /// `COUNTRY-REGION-ORG`. Hyphens inside region or org are not escaped,
    /// so the line cannot always be split back into three fields.
    pub fn wire_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GeoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.country, self.region, self.org)
    }
}

/// Two ASCII letters → uppercased; anything else → `"XX"`.
pub fn normalize_country(raw: &str) -> String {
    let mut chars = raw.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(a), Some(b), None) if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
            raw.to_ascii_uppercase()
        }
        _ => UNKNOWN_COUNTRY.into(),
    }
}

// Values pass through as given, except line breaks are flattened so the
// wire output stays a single line. Blank values take the sentinel.
fn non_empty_or(value: Option<&str>, sentinel: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.replace(['\r', '\n'], " "),
        _ => sentinel.to_string(),
    }
}

/// Why a single provider attempt failed. Every variant is recovered from by
/// moving on to the next provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("invalid payload: {0}")]
    Payload(String),

    #[error("provider reported failure: {0}")]
    Rejected(String),

    #[error("mapping fault: {0}")]
    Fault(String),
}

impl ProviderError {
    /// Error text cut to [`ERROR_TRUNCATE_CHARS`] characters for logging.
    pub fn truncated(&self) -> String {
        truncate_chars(&self.to_string(), ERROR_TRUNCATE_CHARS)
    }
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
