//! geoprobe: container probes.
//!
//! - [`geo`]: IP geolocation with ordered provider fallback.
//! - [`health`]: liveness responders, one on axum and one on raw sockets.

pub mod config;
pub mod geo;
pub mod health;
