//! IP geolocation subsystem.
//!
//! Queries public geolocation APIs in a fixed order, maps each provider's
//! JSON into a common record, and falls back to sentinel values when every
//! provider fails.

pub mod providers;
pub mod report;
pub mod resolver;
pub mod types;

pub use providers::{default_providers, Fetch, HttpFetcher, MappedFields, Provider};
pub use report::Outcome;
pub use resolver::GeoResolver;
pub use types::{GeoRecord, GeoSource, ProviderError};
