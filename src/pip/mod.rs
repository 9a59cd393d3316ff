//! Point-in-polygon (PIP) country lookup.
//!
//! Flattens country boundaries into a [`BoundaryStore`], indexes them with a
//! uniform [`GridIndex`] and answers point queries through [`Engine`].

mod boundary;
pub mod geometry;
mod index;
mod service;

pub use boundary::{BBox, BoundaryStore, CountryRecord, PolygonView, MIN_RING_VERTICES};
pub use index::{CellEntry, GridIndex, IndexStats};
pub use service::{normalize, Engine};
