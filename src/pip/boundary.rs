//! Boundary store: country polygons flattened into offset-indexed arrays.

use geo::orient::{Direction, Orient};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use hashbrown::HashMap;
use std::ops::Range;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{Country, IsoCode};
use crate::NO_COUNTRY;

/// Minimum vertices of a closed ring: three corners plus the closing vertex.
pub const MIN_RING_VERTICES: usize = 4;

/// Axis-aligned bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BBox {
    const EMPTY: BBox = BBox {
        min_lon: f64::INFINITY,
        min_lat: f64::INFINITY,
        max_lon: f64::NEG_INFINITY,
        max_lat: f64::NEG_INFINITY,
    };

    fn extend(&mut self, c: Coord<f64>) {
        self.min_lon = self.min_lon.min(c.x);
        self.min_lat = self.min_lat.min(c.y);
        self.max_lon = self.max_lon.max(c.x);
        self.max_lat = self.max_lat.max(c.y);
    }

    #[inline]
    pub fn contains(&self, c: Coord<f64>) -> bool {
        c.x >= self.min_lon && c.x <= self.max_lon && c.y >= self.min_lat && c.y <= self.max_lat
    }
}

/// Metadata of one country in the store
#[derive(Debug, Clone)]
pub struct CountryRecord {
    numeric_id: u16,
    iso_code: IsoCode,
    name: Option<String>,
    first_polygon: u32,
    polygon_count: u32,
}

impl CountryRecord {
    pub fn numeric_id(&self) -> u16 {
        self.numeric_id
    }

    pub fn iso(&self) -> IsoCode {
        self.iso_code
    }

    /// ISO code as text, empty if the country has none
    pub fn iso_code(&self) -> &str {
        self.iso_code.as_str()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Indices of this country's polygons in the store
    pub fn polygons(&self) -> Range<usize> {
        let start = self.first_polygon as usize;
        start..start + self.polygon_count as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct PolygonRecord {
    /// Index of the outer ring in `ring_offsets`; holes follow it
    first_ring: u32,
    ring_count: u32,
    country: u32,
    bbox: BBox,
}

/// Immutable, order-stable table of countries and their rings.
///
/// Vertices of all rings live in a single array; `ring_offsets[r]..ring_offsets[r + 1]`
/// is ring `r`. Polygons reference a contiguous run of rings, countries a
/// contiguous run of polygons. Outer rings are counter-clockwise and holes
/// clockwise; construction re-orients input that disagrees.
#[derive(Debug, Clone)]
pub struct BoundaryStore {
    countries: Vec<CountryRecord>,
    polygons: Vec<PolygonRecord>,
    ring_offsets: Vec<u32>,
    vertices: Vec<Coord<f64>>,
    by_id: HashMap<u16, u32>,
    by_iso: HashMap<IsoCode, u16>,
}

impl BoundaryStore {
    /// Validate and flatten a set of countries.
    ///
    /// Fails with [`Error::IdCollision`] on a repeated numeric id and with
    /// [`Error::DataCorruption`] on any other invariant violation. No partial
    /// store is returned.
    pub fn new(countries: Vec<Country>) -> Result<Self> {
        let mut store = Self {
            countries: Vec::with_capacity(countries.len()),
            polygons: Vec::new(),
            ring_offsets: vec![0],
            vertices: Vec::new(),
            by_id: HashMap::with_capacity(countries.len()),
            by_iso: HashMap::with_capacity(countries.len()),
        };

        for country in countries {
            store.push(country)?;
        }

        info!(
            "Boundary store ready: {} countries, {} polygons, {} rings, {} vertices",
            store.countries.len(),
            store.polygons.len(),
            store.ring_count(),
            store.vertices.len()
        );

        Ok(store)
    }

    fn push(&mut self, country: Country) -> Result<()> {
        let id = country.numeric_id;
        if id == NO_COUNTRY {
            return Err(Error::corrupt(format!(
                "numeric id {} is reserved for \"no country\"",
                NO_COUNTRY
            )));
        }
        if self.by_id.contains_key(&id) {
            return Err(Error::IdCollision { numeric_id: id });
        }
        if !country.iso_code.is_empty() {
            if let Some(other) = self.by_iso.get(&country.iso_code) {
                return Err(Error::corrupt(format!(
                    "ISO code {} is used by countries {} and {}",
                    country.iso_code, other, id
                )));
            }
        }
        if country.geometry.0.is_empty() {
            return Err(Error::corrupt(format!("country {} has no polygons", id)));
        }

        let country_index = to_u32(self.countries.len(), "country count")?;
        let first_polygon = to_u32(self.polygons.len(), "polygon count")?;

        for (p, polygon) in country.geometry.0.iter().enumerate() {
            let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
            for (r, ring) in rings.enumerate() {
                check_ring(ring).map_err(|reason| {
                    Error::corrupt(format!(
                        "country {} polygon {} ring {}: {}",
                        id, p, r, reason
                    ))
                })?;
            }

            let polygon = polygon.orient(Direction::Default);
            let first_ring = to_u32(self.ring_offsets.len() - 1, "ring count")?;
            let mut bbox = BBox::EMPTY;

            let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
            for ring in rings {
                ring.0.iter().for_each(|c| bbox.extend(*c));
                self.vertices.extend_from_slice(&ring.0);
                let end = to_u32(self.vertices.len(), "vertex count")?;
                self.ring_offsets.push(end);
            }

            self.polygons.push(PolygonRecord {
                first_ring,
                ring_count: 1 + polygon.interiors().len() as u32,
                country: country_index,
                bbox,
            });
        }

        debug!(
            "Stored country {} ({}) with {} polygons",
            id,
            country.iso_code,
            country.geometry.0.len()
        );

        self.by_id.insert(id, country_index);
        if !country.iso_code.is_empty() {
            self.by_iso.insert(country.iso_code, id);
        }
        self.countries.push(CountryRecord {
            numeric_id: id,
            iso_code: country.iso_code,
            name: country.name,
            first_polygon,
            polygon_count: country.geometry.0.len() as u32,
        });

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Countries in dataset order
    pub fn countries(&self) -> impl ExactSizeIterator<Item = &CountryRecord> {
        self.countries.iter()
    }

    pub fn get(&self, numeric_id: u16) -> Option<&CountryRecord> {
        let index = *self.by_id.get(&numeric_id)?;
        Some(&self.countries[index as usize])
    }

    pub fn iso_code(&self, numeric_id: u16) -> Option<&str> {
        self.get(numeric_id).map(CountryRecord::iso_code)
    }

    /// Reverse lookup from ISO code to numeric id
    pub fn numeric_id(&self, iso_code: &str) -> Option<u16> {
        let code = IsoCode::new(iso_code).filter(|c| !c.is_empty())?;
        self.by_iso.get(&code).copied()
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn ring_count(&self) -> usize {
        self.ring_offsets.len() - 1
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn polygon(&self, index: usize) -> PolygonView<'_> {
        PolygonView {
            store: self,
            record: &self.polygons[index],
        }
    }

    pub fn polygons(&self) -> impl ExactSizeIterator<Item = PolygonView<'_>> {
        self.polygons
            .iter()
            .map(move |record| PolygonView { store: self, record })
    }

    #[inline]
    fn ring(&self, index: usize) -> &[Coord<f64>] {
        let start = self.ring_offsets[index] as usize;
        let end = self.ring_offsets[index + 1] as usize;
        &self.vertices[start..end]
    }

    /// Rebuild owned country values in dataset order (rings in stored orientation).
    pub fn to_countries(&self) -> Vec<Country> {
        self.countries
            .iter()
            .map(|record| {
                let polygons = record
                    .polygons()
                    .map(|p| {
                        let view = self.polygon(p);
                        let mut rings = view.rings().map(|r| LineString::new(r.to_vec()));
                        let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
                        Polygon::new(exterior, rings.collect())
                    })
                    .collect();
                Country {
                    numeric_id: record.numeric_id,
                    iso_code: record.iso_code,
                    name: record.name.clone(),
                    geometry: MultiPolygon::new(polygons),
                }
            })
            .collect()
    }
}

/// Borrowed view of one polygon (outer ring plus holes)
#[derive(Clone, Copy)]
pub struct PolygonView<'a> {
    store: &'a BoundaryStore,
    record: &'a PolygonRecord,
}

impl<'a> PolygonView<'a> {
    #[inline]
    pub fn bbox(&self) -> BBox {
        self.record.bbox
    }

    #[inline]
    pub fn country(&self) -> &'a CountryRecord {
        &self.store.countries[self.record.country as usize]
    }

    /// Outer ring first, then holes
    #[inline]
    pub fn rings(&self) -> impl Iterator<Item = &'a [Coord<f64>]> + Clone + 'a {
        let store = self.store;
        let start = self.record.first_ring as usize;
        (start..start + self.record.ring_count as usize).map(move |r| store.ring(r))
    }
}

fn check_ring(ring: &LineString<f64>) -> std::result::Result<(), String> {
    let coords = &ring.0;
    if coords.len() < MIN_RING_VERTICES {
        return Err(format!(
            "{} vertices, at least {} required",
            coords.len(),
            MIN_RING_VERTICES
        ));
    }
    if coords.first() != coords.last() {
        return Err("ring is not closed".to_string());
    }
    for c in coords {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(format!("non-finite vertex ({}, {})", c.x, c.y));
        }
        if !(-180.0..=180.0).contains(&c.x) || !(-90.0..=90.0).contains(&c.y) {
            return Err(format!("vertex ({}, {}) is out of range", c.x, c.y));
        }
    }
    Ok(())
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::corrupt(format!("{} exceeds u32 range", what)))
}
