//! Country records as supplied by a boundary dataset.

use geo::{Area, InteriorPoint};
use geo_types::{MultiPolygon, Point, Polygon};
use serde::{Serialize, Serializer};
use std::fmt;

/// ISO 3166-1 alpha-2 code, or empty.
///
/// Stored inline as two ASCII upper-case bytes; `[0, 0]` is the empty code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IsoCode([u8; 2]);

impl IsoCode {
    pub const EMPTY: IsoCode = IsoCode([0, 0]);

    /// Parse a code. Accepts the empty string or two ASCII letters (any case).
    pub fn new(code: &str) -> Option<Self> {
        match code.as_bytes() {
            [] => Some(Self::EMPTY),
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                Some(IsoCode([a.to_ascii_uppercase(), b.to_ascii_uppercase()]))
            }
            _ => None,
        }
    }

    /// Rebuild a code from its stored form. Rejects anything [`IsoCode::to_bytes`]
    /// could not have produced.
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        match bytes {
            [0, 0] => Some(Self::EMPTY),
            [a, b] if a.is_ascii_uppercase() && b.is_ascii_uppercase() => Some(IsoCode(bytes)),
            _ => None,
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0, 0]
    }

    pub fn as_str(&self) -> &str {
        if self.is_empty() {
            return "";
        }
        std::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl fmt::Display for IsoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for IsoCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A country and its boundary geometry.
///
/// Each polygon's exterior is the outer boundary and its interiors are holes
/// (enclaves). Coordinates are `x = lon`, `y = lat` in WGS84 degrees.
#[derive(Debug, Clone)]
pub struct Country {
    pub numeric_id: u16,
    pub iso_code: IsoCode,
    pub name: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

impl Country {
    pub fn new(numeric_id: u16, iso_code: IsoCode, geometry: MultiPolygon<f64>) -> Self {
        Self {
            numeric_id,
            iso_code,
            name: None,
            geometry,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Polygon with the largest enclosed area (mainland for archipelagos)
    pub fn largest_polygon(&self) -> Option<&Polygon<f64>> {
        self.geometry
            .iter()
            .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
    }

    /// A point guaranteed to lie inside the largest polygon
    pub fn interior_point(&self) -> Option<Point<f64>> {
        self.largest_polygon()?.interior_point()
    }
}
