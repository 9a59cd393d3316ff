//! adm0 - offline country reverse geocoding
//!
//! Resolves a latitude/longitude pair to the country containing it, using a
//! compiled boundary dataset held in memory. Lookups are deterministic,
//! allocation-free and safe to call from any number of threads.

pub mod config;
pub mod dataset;
pub mod error;
pub mod global;
pub mod models;
pub mod pip;

#[cfg(test)]
mod fixtures;

/// Numeric id returned when no country contains the point.
pub const NO_COUNTRY: u16 = 0;

pub use config::{Config, IndexConfig};
pub use error::{Error, Result};
pub use global::{country_id, country_iso};
pub use models::{Country, IsoCode, LookupResult};
pub use pip::Engine;
