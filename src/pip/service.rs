//! Lookup facade: coordinate normalization, cell lookup and candidate evaluation.

use geo_types::Coord;
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

use super::boundary::{BoundaryStore, CountryRecord};
use super::geometry::polygon_contains;
use super::index::GridIndex;
use crate::config::{Config, IndexConfig};
use crate::dataset::codec;
use crate::error::{Error, Result};
use crate::models::{Country, LookupResult};
use crate::NO_COUNTRY;

/// Bring a query coordinate into the canonical domain.
///
/// Latitude is clamped to `[-90, 90]`; longitude is wrapped into `[-180, 180)`,
/// so `180` becomes `-180`. In-range longitudes pass through unchanged.
/// Returns `None` for NaN or infinite input.
#[inline]
pub fn normalize(lat: f64, lon: f64) -> Option<(f64, f64)> {
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    let lat = lat.clamp(-90.0, 90.0);
    let lon = if (-180.0..180.0).contains(&lon) {
        lon
    } else {
        let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
        // rem_euclid can round up to exactly 360
        if wrapped >= 180.0 {
            -180.0
        } else {
            wrapped
        }
    };
    Some((lat, lon))
}

/// Country lookup engine over an immutable boundary store and its grid index.
///
/// Queries never fail and never allocate; the engine is `Send + Sync` and can
/// be shared by any number of threads.
pub struct Engine {
    store: BoundaryStore,
    index: GridIndex,
}

impl Engine {
    pub fn new(store: BoundaryStore, config: &IndexConfig) -> Result<Self> {
        let index = GridIndex::build(&store, config)?;
        Ok(Self { store, index })
    }

    pub fn from_countries(countries: Vec<Country>, config: &IndexConfig) -> Result<Self> {
        Self::new(BoundaryStore::new(countries)?, config)
    }

    /// Build from a compiled dataset blob (e.g. one embedded with `include_bytes!`).
    pub fn from_bytes(bytes: &[u8], config: &IndexConfig) -> Result<Self> {
        Self::from_countries(codec::decode(bytes)?, config)
    }

    /// Build from a compiled dataset file.
    pub fn open<P: AsRef<Path>>(path: P, config: &IndexConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading boundary dataset from {}", path.display());
        let file = File::open(path)?;
        // SAFETY: the map is read-only and dropped before this function returns;
        // the dataset file is not expected to change while it is being decoded.
        let map = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&map, config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config
            .dataset
            .path
            .as_ref()
            .ok_or_else(|| Error::Config("dataset.path is not set".to_string()))?;
        Self::open(path, &config.index)
    }

    /// The country containing a point, if any.
    ///
    /// When several countries contain the point the lowest numeric id wins.
    #[inline]
    pub fn lookup(&self, lat: f64, lon: f64) -> Option<&CountryRecord> {
        let (lat, lon) = normalize(lat, lon)?;
        let point = Coord { x: lon, y: lat };

        for entry in self.index.candidates(self.index.cell(lat, lon)) {
            let polygon = self.store.polygon(entry.polygon());
            if entry.is_interior() || polygon_contains(polygon, point) {
                return Some(polygon.country());
            }
        }
        None
    }

    /// Numeric id of the containing country, `0` if none.
    #[inline]
    pub fn country_id(&self, lat: f64, lon: f64) -> u16 {
        self.lookup(lat, lon)
            .map_or(NO_COUNTRY, CountryRecord::numeric_id)
    }

    /// ISO 3166-1 alpha-2 code of the containing country, empty if none.
    #[inline]
    pub fn country_iso(&self, lat: f64, lon: f64) -> &str {
        self.lookup(lat, lon).map_or("", CountryRecord::iso_code)
    }

    /// Id, ISO code and name from a single evaluation.
    pub fn resolve(&self, lat: f64, lon: f64) -> LookupResult<'_> {
        match self.lookup(lat, lon) {
            Some(country) => LookupResult {
                numeric_id: country.numeric_id(),
                iso_code: country.iso(),
                name: country.name(),
            },
            None => LookupResult::NONE,
        }
    }

    /// Numeric ids for a batch of `(lat, lon)` pairs, evaluated in parallel.
    pub fn country_ids(&self, points: &[(f64, f64)]) -> Vec<u16> {
        points
            .par_iter()
            .map(|&(lat, lon)| self.country_id(lat, lon))
            .collect()
    }

    pub fn store(&self) -> &BoundaryStore {
        &self.store
    }

    pub fn index(&self) -> &GridIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::models::IsoCode;
    use geo::{Centroid, Contains};
    use geo_types::{Point, Polygon};

    fn engine() -> Engine {
        Engine::from_countries(fixtures::world(), &IndexConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(48.0, 2.0), Some((48.0, 2.0)));
        assert_eq!(normalize(95.0, 0.0), Some((90.0, 0.0)));
        assert_eq!(normalize(-91.0, 0.0), Some((-90.0, 0.0)));
        assert_eq!(normalize(0.0, 180.0), Some((0.0, -180.0)));
        assert_eq!(normalize(0.0, -180.0), Some((0.0, -180.0)));
        assert_eq!(normalize(0.0, 190.0), Some((0.0, -170.0)));
        assert_eq!(normalize(0.0, -190.0), Some((0.0, 170.0)));
        assert_eq!(normalize(0.0, 540.0), Some((0.0, -180.0)));
        assert_eq!(normalize(0.0, 720.0), Some((0.0, 0.0)));
        assert_eq!(normalize(f64::NAN, 0.0), None);
        assert_eq!(normalize(0.0, f64::INFINITY), None);
    }

    #[test]
    fn test_example_scenarios() {
        let engine = engine();

        assert_eq!(engine.country_id(48.8566, 2.3522), fixtures::FRANCE);
        assert_eq!(engine.country_iso(48.8566, 2.3522), "FR");

        assert_eq!(engine.country_id(0.0, 0.0), NO_COUNTRY);
        assert_eq!(engine.country_iso(0.0, 0.0), "");

        // nothing claims the North Pole: north edges are exclusive
        assert_eq!(engine.country_id(90.0, 0.0), NO_COUNTRY);
        assert_eq!(engine.country_id(123.0, 0.0), NO_COUNTRY);
    }

    #[test]
    fn test_south_pole_and_clamping() {
        let engine = engine();
        assert_eq!(engine.country_id(-90.0, 0.0), fixtures::ANTARCTICA);
        assert_eq!(engine.country_id(-90.0, -180.0), fixtures::ANTARCTICA);
        assert_eq!(engine.country_id(-135.0, 45.0), fixtures::ANTARCTICA);
        assert_eq!(engine.country_iso(-89.9, 179.9), "AQ");
    }

    #[test]
    fn test_invalid_input_is_sentinel() {
        let engine = engine();
        assert_eq!(engine.country_id(f64::NAN, 2.3522), NO_COUNTRY);
        assert_eq!(engine.country_id(48.8566, f64::NAN), NO_COUNTRY);
        assert_eq!(engine.country_id(f64::INFINITY, 0.0), NO_COUNTRY);
        assert_eq!(engine.country_iso(f64::NEG_INFINITY, 0.0), "");
    }

    #[test]
    fn test_hole_resolves_to_enclave() {
        let engine = engine();
        assert_eq!(engine.country_id(-29.6, 28.2), fixtures::LESOTHO);
        assert_eq!(engine.country_iso(-29.6, 28.2), "LS");
        assert_eq!(engine.country_id(-26.0, 25.0), fixtures::SOUTH_AFRICA);
        // shared border: exactly one side claims each edge
        assert_eq!(engine.country_id(-29.0, 27.0), fixtures::LESOTHO);
        assert_eq!(engine.country_id(-29.0, 29.5), fixtures::SOUTH_AFRICA);
    }

    #[test]
    fn test_antimeridian() {
        let engine = engine();
        for lon in [179.9999, -180.0, 180.0, 540.0, -179.5, 177.0] {
            assert_eq!(engine.country_id(-17.5, lon), fixtures::FIJI, "lon {lon}");
        }
        assert_eq!(engine.country_id(-17.5, -177.9), NO_COUNTRY);
        assert_eq!(engine.country_id(-17.5, 176.9), NO_COUNTRY);
    }

    #[test]
    fn test_overlap_tie_break_lowest_id() {
        let engine = engine();
        assert_eq!(engine.country_id(15.0, 109.5), fixtures::OVERLAP_LOW);
        assert_eq!(engine.country_id(15.0, 105.0), fixtures::OVERLAP_HIGH);
        assert_eq!(engine.country_id(15.0, 115.0), fixtures::OVERLAP_LOW);
    }

    #[test]
    fn test_country_without_iso() {
        let engine = engine();
        assert_eq!(engine.country_id(61.0, 61.0), fixtures::UNNAMED);
        assert_eq!(engine.country_iso(61.0, 61.0), "");
    }

    #[test]
    fn test_boundary_monotonicity() {
        let engine = engine();
        // just outside the western and northern tips of France
        assert_eq!(engine.country_id(48.4, -4.81), NO_COUNTRY);
        assert_eq!(engine.country_id(48.4, -4.79), fixtures::FRANCE);
        assert_eq!(engine.country_id(51.1001, 2.5), NO_COUNTRY);
        // east edge of South Africa
        assert_eq!(engine.country_id(-28.0, 33.0001), NO_COUNTRY);
        assert_eq!(engine.country_id(-28.0, 32.9999), fixtures::SOUTH_AFRICA);
        // notch of the L-shaped fixture
        assert_eq!(engine.country_id(-40.0, -68.0), NO_COUNTRY);
        assert_eq!(engine.country_id(-52.0, -68.0), fixtures::CHILE);
    }

    #[test]
    fn test_centroid_of_largest_ring_resolves_to_country() {
        let engine = engine();
        for country in fixtures::world() {
            let largest = country.largest_polygon().unwrap();
            let outer_ring = Polygon::new(largest.exterior().clone(), vec![]);
            let centroid = outer_ring.centroid().unwrap();
            assert_eq!(
                engine.country_id(centroid.y(), centroid.x()),
                country.numeric_id,
                "{:?}",
                country.name
            );
        }
    }

    #[test]
    fn test_interior_point_resolves_to_country() {
        let engine = engine();
        for country in fixtures::world() {
            let p = country.interior_point().unwrap();
            assert_eq!(engine.country_id(p.y(), p.x()), country.numeric_id);
        }
    }

    #[test]
    fn test_entry_points_are_consistent() {
        let engine = engine();
        let store = engine.store();
        let mut lat = -89.5;
        while lat < 90.0 {
            let mut lon = -179.7;
            while lon < 180.0 {
                let id = engine.country_id(lat, lon);
                let iso = engine.country_iso(lat, lon);
                if id == NO_COUNTRY {
                    assert_eq!(iso, "");
                } else {
                    assert_eq!(Some(iso), store.iso_code(id));
                }
                let resolved = engine.resolve(lat, lon);
                assert_eq!(resolved.numeric_id, id);
                assert_eq!(resolved.iso_code.as_str(), iso);
                // determinism
                assert_eq!(engine.country_id(lat, lon), id);
                lon += 1.3;
            }
            lat += 0.9;
        }
    }

    #[test]
    fn test_resolve_includes_name() {
        let engine = engine();
        let result = engine.resolve(48.8566, 2.3522);
        assert_eq!(result.numeric_id, fixtures::FRANCE);
        assert_eq!(result.iso_code, IsoCode::new("FR").unwrap());
        assert_eq!(result.name, Some("France"));
        assert!(result.is_match());

        assert_eq!(engine.resolve(0.0, 0.0), LookupResult::NONE);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"numeric_id":250,"iso_code":"FR","name":"France"}"#);
    }

    /// The engine agrees with `geo::Contains` (lowest id on overlap) across the globe.
    #[test]
    fn test_agrees_with_reference_containment() {
        let countries = fixtures::world();
        for cells_per_degree in [1, 4] {
            let engine =
                Engine::from_countries(countries.clone(), &IndexConfig::new(cells_per_degree))
                    .unwrap();
            let mut lat = -89.877;
            while lat < 90.0 {
                let mut lon = -179.913;
                while lon < 180.0 {
                    let point = Point::new(lon, lat);
                    let expected = countries
                        .iter()
                        .filter(|c| c.geometry.contains(&point))
                        .map(|c| c.numeric_id)
                        .min()
                        .unwrap_or(NO_COUNTRY);
                    assert_eq!(engine.country_id(lat, lon), expected, "({lat}, {lon})");
                    lon += 0.37;
                }
                lat += 0.29;
            }
        }
    }

    #[test]
    fn test_batch_matches_single() {
        let engine = engine();
        let points = vec![(48.8566, 2.3522), (0.0, 0.0), (-29.6, 28.2), (-17.5, 180.0)];
        let ids = engine.country_ids(&points);
        let expected: Vec<u16> = points
            .iter()
            .map(|&(lat, lon)| engine.country_id(lat, lon))
            .collect();
        assert_eq!(ids, expected);
        assert_eq!(ids[0], fixtures::FRANCE);
    }

    #[test]
    fn test_empty_engine() {
        let engine = Engine::from_countries(vec![], &IndexConfig::default()).unwrap();
        assert_eq!(engine.country_id(48.8566, 2.3522), NO_COUNTRY);
        assert!(engine.store().is_empty());
        assert_eq!(engine.index().stats().entries, 0);
    }

    #[test]
    fn test_open_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.adm0");
        let blob = codec::encode(&fixtures::world(), &codec::EncodeOptions::default()).unwrap();
        std::fs::write(&path, blob).unwrap();

        let engine = Engine::open(&path, &IndexConfig::default()).unwrap();
        assert_eq!(engine.country_id(48.8566, 2.3522), fixtures::FRANCE);

        let config = Config::from_toml_str(&format!(
            "[dataset]\npath = {:?}\n",
            path.display().to_string()
        ))
        .unwrap();
        let engine = Engine::from_config(&config).unwrap();
        assert_eq!(engine.country_iso(-29.6, 28.2), "LS");

        assert!(matches!(
            Engine::from_config(&Config::default()),
            Err(Error::Config(_))
        ));
    }
}
