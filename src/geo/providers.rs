//! Geolocation providers: the ordered endpoint table, per-provider field
//! mapping, and the HTTP fetch seam.

use super::types::ProviderError;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

const USER_AGENT: &str = concat!("geoprobe/", env!("CARGO_PKG_VERSION"));

// ─── Provider table ─────────────────────────────────────────────

/// Fields pulled out of a provider payload, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedFields {
    pub country: Option<String>,
    pub region: Option<String>,
    pub org: Option<String>,
}

/// Translates one provider's JSON object into [`MappedFields`].
pub type FieldMap = fn(&Map<String, Value>) -> Result<MappedFields, ProviderError>;

/// A remote geolocation endpoint and how to read its answer.
#[derive(Clone)]
pub struct Provider {
    pub name: &'static str,
    pub url: String,
    pub timeout: Duration,
    pub map: FieldMap,
}

impl Provider {
    pub fn new(name: &'static str, url: impl Into<String>, timeout: Duration, map: FieldMap) -> Self {
        Self {
            name,
            url: url.into(),
            timeout,
            map,
        }
    }

    /// Check the payload shape and run this provider's mapping.
    pub fn extract(&self, payload: &Value) -> Result<MappedFields, ProviderError> {
        let obj = payload
            .as_object()
            .ok_or_else(|| ProviderError::Payload("expected a JSON object".into()))?;
        if obj.is_empty() {
            return Err(ProviderError::Payload("empty JSON object".into()));
        }
        (self.map)(obj)
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// The reference chain, in priority order.
pub fn default_providers(timeout: Duration) -> Vec<Provider> {
    vec![
        Provider::new("ip-api.com", "http://ip-api.com/json", timeout, map_ip_api),
        Provider::new("ipapi.co", "https://ipapi.co/json", timeout, map_ipapi_co),
        Provider::new("ipinfo.io", "https://ipinfo.io/json", timeout, map_ipinfo),
    ]
}

// ─── Field mappings ─────────────────────────────────────────────

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// A missing country key maps to the sentinel; a key holding `null` or a
/// non-string value cannot be normalized and fails the provider.
fn country_field(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, ProviderError> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ProviderError::Payload(format!(
            "`{}` is not a string: {}",
            key, other
        ))),
    }
}

/// Rate-limited or quota-exhausted replies come back as 2xx with an
/// `"error": true` marker.
fn reject_error_marker(obj: &Map<String, Value>) -> Result<(), ProviderError> {
    if obj.get("error").and_then(Value::as_bool) == Some(true) {
        let reason = str_field(obj, "reason")
            .or_else(|| str_field(obj, "message"))
            .unwrap_or_else(|| "error flag set".into());
        return Err(ProviderError::Rejected(reason));
    }
    Ok(())
}

/// ip-api.com: `countryCode`, `regionName`, `isp`.
pub fn map_ip_api(obj: &Map<String, Value>) -> Result<MappedFields, ProviderError> {
    if obj.get("status").and_then(Value::as_str) == Some("fail") {
        let reason = str_field(obj, "message").unwrap_or_else(|| "status fail".into());
        return Err(ProviderError::Rejected(reason));
    }
    Ok(MappedFields {
        country: country_field(obj, "countryCode")?,
        region: str_field(obj, "regionName"),
        org: str_field(obj, "isp"),
    })
}

/// ipapi.co: `country`, `region`, `org`.
pub fn map_ipapi_co(obj: &Map<String, Value>) -> Result<MappedFields, ProviderError> {
    reject_error_marker(obj)?;
    Ok(MappedFields {
        country: country_field(obj, "country")?,
        region: str_field(obj, "region"),
        org: str_field(obj, "org"),
    })
}

/// ipinfo.io: same keys as ipapi.co.
pub fn map_ipinfo(obj: &Map<String, Value>) -> Result<MappedFields, ProviderError> {
    reject_error_marker(obj)?;
    Ok(MappedFields {
        country: country_field(obj, "country")?,
        region: str_field(obj, "region"),
        org: str_field(obj, "org"),
    })
}

// ─── HTTP fetch ─────────────────────────────────────────────────

/// Issues one GET and decodes the body as JSON.
pub trait Fetch {
    fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, ProviderError>;
}

/// Blocking `ureq` fetcher used outside of tests.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpFetcher {
    fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, ProviderError> {
        let response = self
            .agent
            .get(url)
            .timeout(timeout)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => ProviderError::Status(code),
                ureq::Error::Transport(t) => ProviderError::Transport(t.to_string()),
            })?;

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(ProviderError::Status(status));
        }

        let body = response
            .into_string()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| ProviderError::Payload(e.to_string()))
    }
}
