//! Import country boundaries from a GeoJSON FeatureCollection.
//!
//! Targets Natural-Earth style admin-0 exports: one or more features per
//! country carrying an ISO 3166-1 alpha-2 property and `Polygon` or
//! `MultiPolygon` geometry.

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Read;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Country, IsoCode};

/// ISO value Natural Earth uses for territories without a code
pub const UNASSIGNED_ISO: &str = "-99";

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub iso_field: String,
    pub name_field: String,
    /// Property holding the numeric id; ids are assigned in ISO order when unset.
    pub id_field: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            iso_field: "ISO_A2_EH".to_string(),
            name_field: "NAME".to_string(),
            id_field: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    #[serde(other)]
    Other,
}

/// `[lon, lat]` with optional trailing elements such as altitude
type Position = Vec<f64>;

/// Countries merged from features that share an ISO code
struct Pending {
    numeric_id: Option<u16>,
    name: Option<String>,
    polygons: Vec<Polygon<f64>>,
}

/// Read a FeatureCollection and build one [`Country`] per ISO code.
pub fn read_countries<R: Read>(reader: R, options: &ImportOptions) -> Result<Vec<Country>> {
    let collection: FeatureCollection = serde_json::from_reader(reader)?;
    let feature_count = collection.features.len();

    let mut by_iso: BTreeMap<IsoCode, Pending> = BTreeMap::new();
    let mut skipped = 0usize;

    for (i, feature) in collection.features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();
        let name = string_property(&properties, &options.name_field);

        let iso = match string_property(&properties, &options.iso_field) {
            Some(raw) if raw != UNASSIGNED_ISO => match IsoCode::new(&raw) {
                Some(iso) if !iso.is_empty() => iso,
                _ => {
                    warn!(
                        "Skipping feature {} ({}): malformed ISO code {:?}",
                        i,
                        name.as_deref().unwrap_or("unnamed"),
                        raw
                    );
                    skipped += 1;
                    continue;
                }
            },
            _ => {
                warn!(
                    "Skipping feature {} ({}): no ISO code",
                    i,
                    name.as_deref().unwrap_or("unnamed")
                );
                skipped += 1;
                continue;
            }
        };

        let polygons = match feature.geometry {
            Some(Geometry::Polygon { coordinates }) => vec![to_polygon(coordinates, iso)?],
            Some(Geometry::MultiPolygon { coordinates }) => coordinates
                .into_iter()
                .map(|rings| to_polygon(rings, iso))
                .collect::<Result<_>>()?,
            Some(Geometry::Other) | None => {
                warn!("Skipping feature {} ({}): no polygon geometry", i, iso);
                skipped += 1;
                continue;
            }
        };

        let numeric_id = match &options.id_field {
            Some(field) => Some(id_property(&properties, field).ok_or_else(|| {
                Error::corrupt(format!(
                    "feature {} ({}) has no valid numeric id in {:?}",
                    i, iso, field
                ))
            })?),
            None => None,
        };

        let entry = by_iso.entry(iso).or_insert_with(|| Pending {
            numeric_id,
            name: None,
            polygons: Vec::new(),
        });
        if entry.numeric_id != numeric_id {
            return Err(Error::corrupt(format!(
                "features for {} carry different numeric ids",
                iso
            )));
        }
        if entry.name.is_none() {
            entry.name = name;
        }
        debug!("Feature {} -> {} ({} polygons)", i, iso, polygons.len());
        entry.polygons.extend(polygons);
    }

    let countries: Vec<Country> = by_iso
        .into_iter()
        .enumerate()
        .map(|(i, (iso, pending))| {
            let numeric_id = match pending.numeric_id {
                Some(id) => id,
                None => u16::try_from(i + 1)
                    .map_err(|_| Error::corrupt("more countries than numeric ids"))?,
            };
            Ok(Country {
                numeric_id,
                iso_code: iso,
                name: pending.name,
                geometry: MultiPolygon::new(pending.polygons),
            })
        })
        .collect::<Result<_>>()?;

    info!(
        "Imported {} countries from {} features ({} skipped)",
        countries.len(),
        feature_count,
        skipped
    );
    Ok(countries)
}

fn to_polygon(rings: Vec<Vec<Position>>, iso: IsoCode) -> Result<Polygon<f64>> {
    let mut rings = rings
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .map(|position| match position[..] {
                    [x, y, ..] => Ok(Coord { x, y }),
                    _ => Err(Error::corrupt(format!(
                        "{} has a position with {} elements",
                        iso,
                        position.len()
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(LineString::new)
        })
        .collect::<Result<Vec<_>>>()?
        .into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
    Ok(Polygon::new(exterior, rings.collect()))
}

fn string_property(properties: &Map<String, Value>, field: &str) -> Option<String> {
    match properties.get(field)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}

fn id_property(properties: &Map<String, Value>, field: &str) -> Option<u16> {
    let id = match properties.get(field)? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u16::try_from(id).ok().filter(|&id| id != crate::NO_COUNTRY)
}
