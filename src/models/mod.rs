//! Core data models for the lookup engine.

pub mod country;
pub mod lookup;

pub use country::{Country, IsoCode};
pub use lookup::LookupResult;
