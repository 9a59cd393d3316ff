//! Small synthetic world used across unit tests.

use geo::polygon;
use geo_types::{LineString, MultiPolygon, Polygon};

use crate::models::{Country, IsoCode};

pub const ANTARCTICA: u16 = 10;
pub const CHILE: u16 = 152;
pub const FIJI: u16 = 242;
pub const FRANCE: u16 = 250;
pub const LESOTHO: u16 = 426;
pub const SOUTH_AFRICA: u16 = 710;
/// Overlaps [`OVERLAP_HIGH`] on lon 109..110
pub const OVERLAP_LOW: u16 = 900;
pub const OVERLAP_HIGH: u16 = 901;
/// A territory without an ISO code
pub const UNNAMED: u16 = 903;

fn rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Polygon<f64> {
    polygon![
        (x: min_lon, y: min_lat),
        (x: max_lon, y: min_lat),
        (x: max_lon, y: max_lat),
        (x: min_lon, y: max_lat),
    ]
}

fn country(id: u16, iso: &str, name: &str, polygons: Vec<Polygon<f64>>) -> Country {
    Country::new(
        id,
        IsoCode::new(iso).expect("fixture ISO code"),
        MultiPolygon::new(polygons),
    )
    .with_name(name)
}

pub fn world() -> Vec<Country> {
    let france = polygon![
        (x: -1.8, y: 43.4),
        (x: 3.2, y: 42.4),
        (x: 7.6, y: 43.7),
        (x: 8.2, y: 49.0),
        (x: 2.5, y: 51.1),
        (x: -4.8, y: 48.4),
    ];

    let lesotho_outline = rect(27.0, -30.7, 29.5, -28.6);
    // hole given counter-clockwise on purpose; the store re-orients it
    let south_africa = Polygon::new(
        rect(16.0, -35.0, 33.0, -22.0).exterior().clone(),
        vec![LineString::new(lesotho_outline.exterior().0.clone())],
    );

    let chile = polygon![
        (x: -75.0, y: -55.0),
        (x: -66.0, y: -55.0),
        (x: -66.0, y: -50.0),
        (x: -70.0, y: -50.0),
        (x: -70.0, y: -18.0),
        (x: -75.0, y: -18.0),
    ];

    // clockwise input, re-oriented by the store
    let mut unnamed = rect(60.0, 60.0, 62.0, 62.0);
    unnamed.exterior_mut(|ring| ring.0.reverse());

    vec![
        country(FRANCE, "FR", "France", vec![france]),
        country(SOUTH_AFRICA, "ZA", "South Africa", vec![south_africa]),
        country(LESOTHO, "LS", "Lesotho", vec![lesotho_outline]),
        country(
            FIJI,
            "FJ",
            "Fiji",
            vec![rect(177.0, -19.0, 180.0, -16.0), rect(-180.0, -19.0, -178.0, -16.0)],
        ),
        country(ANTARCTICA, "AQ", "Antarctica", vec![rect(-180.0, -90.0, 180.0, -65.0)]),
        country(CHILE, "CL", "Chile", vec![chile]),
        country(OVERLAP_HIGH, "XA", "Overlap High", vec![rect(100.0, 10.0, 110.0, 20.0)]),
        country(OVERLAP_LOW, "XB", "Overlap Low", vec![rect(109.0, 10.0, 119.0, 20.0)]),
        country(UNNAMED, "", "Unnamed", vec![unnamed]),
    ]
}
