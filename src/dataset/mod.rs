//! Boundary dataset formats: the compiled binary blob and GeoJSON import.

pub mod codec;
pub mod geojson;

pub use codec::{decode, encode, EncodeOptions};
pub use geojson::{read_countries, ImportOptions};
