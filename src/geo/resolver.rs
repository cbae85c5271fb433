//! Geolocation resolver: walks the provider chain in order and returns the
//! first record that comes back clean.
//!
//! Flow: provider 1 → provider 2 → ... → fallback record.
//! No retries, no racing, no overall deadline.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tracing::{info, warn};

use super::providers::{default_providers, Fetch, HttpFetcher, Provider};
use super::types::{GeoRecord, GeoSource, ProviderError};

/// The resolver with its ordered provider chain.
pub struct GeoResolver<F: Fetch = HttpFetcher> {
    fetcher: F,
    providers: Vec<Provider>,
}

impl GeoResolver<HttpFetcher> {
    /// Reference providers over real HTTP, each with `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_fetcher(HttpFetcher::new(), default_providers(timeout))
    }
}

impl<F: Fetch> GeoResolver<F> {
    /// Create a resolver with a specific fetcher and chain (for testing).
    pub fn with_fetcher(fetcher: F, providers: Vec<Provider>) -> Self {
        Self { fetcher, providers }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Resolve the caller's location. Never fails: when every provider
    /// errors the sentinel fallback record is returned.
    pub fn resolve(&self) -> GeoRecord {
        for provider in &self.providers {
            info!(provider = provider.name, url = %provider.url, "trying provider");

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.attempt(provider)))
                .unwrap_or_else(|payload| Err(ProviderError::Fault(panic_message(&*payload))));

            match outcome {
                Ok(record) => {
                    info!(provider = provider.name, "got data from provider");
                    return record;
                }
                Err(e) => {
                    warn!(
                        provider = provider.name,
                        url = %provider.url,
                        error = %e.truncated(),
                        "provider failed"
                    );
                }
            }
        }

        warn!("all providers failed - using fallback data");
        GeoRecord::fallback()
    }

    fn attempt(&self, provider: &Provider) -> Result<GeoRecord, ProviderError> {
        let payload = self.fetcher.get_json(&provider.url, provider.timeout)?;
        let fields = provider.extract(&payload)?;
        Ok(GeoRecord::new(
            fields.country.as_deref(),
            fields.region.as_deref(),
            fields.org.as_deref(),
            GeoSource::Provider(provider.name),
        ))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during provider attempt".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::providers::{map_ip_api, map_ipapi_co, map_ipinfo, FieldMap, MappedFields};
    use serde_json::{json, Map, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;

    const P1: &str = "http://p1.test/json";
    const P2: &str = "http://p2.test/json";
    const P3: &str = "http://p3.test/json";

    type Reply = Box<dyn Fn() -> Result<Value, ProviderError>>;

    /// Serves canned replies per URL and counts calls.
    #[derive(Default)]
    struct ScriptedFetcher {
        replies: HashMap<&'static str, Reply>,
        calls: RefCell<HashMap<String, usize>>,
    }

    impl ScriptedFetcher {
        fn reply(mut self, url: &'static str, f: impl Fn() -> Result<Value, ProviderError> + 'static) -> Self {
            self.replies.insert(url, Box::new(f));
            self
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.borrow().get(url).copied().unwrap_or(0)
        }
    }

    impl Fetch for ScriptedFetcher {
        fn get_json(&self, url: &str, _timeout: Duration) -> Result<Value, ProviderError> {
            *self.calls.borrow_mut().entry(url.to_string()).or_insert(0) += 1;
            match self.replies.get(url) {
                Some(reply) => reply(),
                None => Err(ProviderError::Transport("connection refused".into())),
            }
        }
    }

    fn chain() -> Vec<Provider> {
        let t = Duration::from_secs(5);
        vec![
            Provider::new("p1", P1, t, map_ip_api),
            Provider::new("p2", P2, t, map_ipapi_co),
            Provider::new("p3", P3, t, map_ipinfo),
        ]
    }

    fn ok_p1() -> Result<Value, ProviderError> {
        Ok(json!({"countryCode": "US", "regionName": "California", "isp": "Comcast"}))
    }

    fn ok_p2() -> Result<Value, ProviderError> {
        Ok(json!({"country": "se", "region": "Stockholm", "org": "Telia Company"}))
    }

    fn ok_p3() -> Result<Value, ProviderError> {
        Ok(json!({"country": "DE", "region": "Hesse", "org": "AS3320 Deutsche Telekom AG"}))
    }

    fn is_country_code(s: &str) -> bool {
        s.len() == 2 && s.bytes().all(|b| b.is_ascii_uppercase())
    }

    #[test]
    fn test_first_success_short_circuits() {
        let fetcher = ScriptedFetcher::default()
            .reply(P1, ok_p1)
            .reply(P2, ok_p2)
            .reply(P3, ok_p3);
        let resolver = GeoResolver::with_fetcher(fetcher, chain());

        let rec = resolver.resolve();
        assert_eq!(rec.wire_line(), "US-California-Comcast");
        assert_eq!(rec.source(), &GeoSource::Provider("p1"));
        assert_eq!(resolver.fetcher.calls(P1), 1);
        assert_eq!(resolver.fetcher.calls(P2), 0);
        assert_eq!(resolver.fetcher.calls(P3), 0);
    }

    #[test]
    fn test_timeout_falls_through() {
        let fetcher = ScriptedFetcher::default()
            .reply(P1, || Err(ProviderError::Transport("timed out reading response".into())))
            .reply(P2, ok_p2)
            .reply(P3, ok_p3);
        let resolver = GeoResolver::with_fetcher(fetcher, chain());

        let rec = resolver.resolve();
        assert_eq!(rec.wire_line(), "SE-Stockholm-Telia Company");
        assert_eq!(resolver.fetcher.calls(P1), 1);
        assert_eq!(resolver.fetcher.calls(P3), 0);
    }

    #[test]
    fn test_server_error_falls_through() {
        let fetcher = ScriptedFetcher::default()
            .reply(P1, || Err(ProviderError::Status(500)))
            .reply(P2, ok_p2);
        let resolver = GeoResolver::with_fetcher(fetcher, chain());

        let rec = resolver.resolve();
        assert_eq!(rec.source(), &GeoSource::Provider("p2"));
        assert_eq!(rec.country(), "SE");
    }

    #[test]
    fn test_malformed_json_falls_through() {
        let fetcher = ScriptedFetcher::default()
            .reply(P1, || Err(ProviderError::Payload("expected value at line 1 column 1".into())))
            .reply(P2, ok_p2);
        let resolver = GeoResolver::with_fetcher(fetcher, chain());

        let rec = resolver.resolve();
        assert_eq!(rec.source(), &GeoSource::Provider("p2"));
        assert_eq!(rec.region(), "Stockholm");
    }

    #[test]
    fn test_rejected_payload_falls_through() {
        let fetcher = ScriptedFetcher::default()
            .reply(P1, || Ok(json!({"status": "fail", "message": "quota"})))
            .reply(P2, || Ok(json!({"error": true, "reason": "RateLimited"})))
            .reply(P3, ok_p3);
        let resolver = GeoResolver::with_fetcher(fetcher, chain());

        let rec = resolver.resolve();
        assert_eq!(rec.source(), &GeoSource::Provider("p3"));
        assert_eq!(rec.wire_line(), "DE-Hesse-AS3320 Deutsche Telekom AG");
    }

    #[test]
    fn test_all_fail_returns_fallback() {
        let fetcher = ScriptedFetcher::default()
            .reply(P1, || Err(ProviderError::Status(503)))
            .reply(P2, || Ok(json!("not an object")))
            .reply(P3, || Err(ProviderError::Transport("dns failure".into())));
        let resolver = GeoResolver::with_fetcher(fetcher, chain());

        let rec = resolver.resolve();
        assert_eq!(rec, GeoRecord::fallback());
        assert_eq!(rec.wire_line(), "XX-UnknownRegion-UnknownProvider");
        for url in [P1, P2, P3] {
            assert_eq!(resolver.fetcher.calls(url), 1);
        }
    }

    #[test]
    fn test_defaulted_fields_still_short_circuit() {
        let fetcher = ScriptedFetcher::default()
            .reply(P1, || Ok(json!({"query": "203.0.113.7"})))
            .reply(P2, ok_p2);
        let resolver = GeoResolver::with_fetcher(fetcher, chain());

        let rec = resolver.resolve();
        assert_eq!(rec.wire_line(), "XX-UnknownRegion-UnknownProvider");
        assert_eq!(rec.source(), &GeoSource::Provider("p1"));
        assert_eq!(resolver.fetcher.calls(P2), 0);
    }

    #[test]
    fn test_mapping_panic_is_contained() {
        fn broken(_: &Map<String, Value>) -> Result<MappedFields, ProviderError> {
            panic!("mapping bug");
        }
        let t = Duration::from_secs(5);
        let providers = vec![
            Provider::new("broken", P1, t, broken as FieldMap),
            Provider::new("p2", P2, t, map_ipapi_co),
        ];
        let fetcher = ScriptedFetcher::default().reply(P1, ok_p1).reply(P2, ok_p2);
        let resolver = GeoResolver::with_fetcher(fetcher, providers);

        let rec = resolver.resolve();
        assert_eq!(rec.source(), &GeoSource::Provider("p2"));
    }

    #[test]
    fn test_country_invariant_across_payloads() {
        let cases = [
            json!({"countryCode": "usa"}),
            json!({"countryCode": "us"}),
            json!({"countryCode": ""}),
            json!({"countryCode": 42}),
            json!({"countryCode": "1a"}),
            json!({"countryCode": null, "isp": "Comcast"}),
        ];
        for payload in cases {
            let fetcher = ScriptedFetcher::default().reply(P1, move || Ok(payload.clone()));
            let rec = GeoResolver::with_fetcher(fetcher, chain()).resolve();
            assert!(is_country_code(rec.country()), "bad country {:?}", rec.country());
        }

        let failing = ScriptedFetcher::default().reply(P1, || Err(ProviderError::Status(500)));
        let rec = GeoResolver::with_fetcher(failing, chain()).resolve();
        assert!(is_country_code(rec.country()));
    }

    #[test]
    fn test_null_country_falls_through() {
        let fetcher = ScriptedFetcher::default()
            .reply(P1, || Ok(json!({"countryCode": null, "regionName": 7, "isp": "Comcast"})))
            .reply(P2, ok_p2);
        let resolver = GeoResolver::with_fetcher(fetcher, chain());

        let rec = resolver.resolve();
        assert_eq!(rec.wire_line(), "SE-Stockholm-Telia Company");
        assert_eq!(rec.source(), &GeoSource::Provider("p2"));
        assert_eq!(resolver.fetcher.calls(P1), 1);
        assert_eq!(resolver.fetcher.calls(P2), 1);
    }

    #[test]
    fn test_empty_chain_is_fallback() {
        let resolver = GeoResolver::with_fetcher(ScriptedFetcher::default(), Vec::new());
        assert_eq!(resolver.resolve(), GeoRecord::fallback());
    }
}
