//! Compact binary dataset format.
//!
//! ```text
//! header   magic "ADM0" | version u16 | flags u16 | payload_len u32 | xxh64 u64
//! payload  country_count u32
//!          per country: numeric_id u16 | iso [u8; 2] | name_len u16 | name
//!                       polygon_count u32
//!                       per polygon: ring_count u32
//!                                    per ring: vertex_count u32 | (lon i32, lat i32)*
//! ```
//!
//! All integers are little-endian. Coordinates are fixed point in units of
//! 1e-7 degree. `payload_len` and the checksum describe the uncompressed
//! payload; flag bit 0 marks a zlib-compressed payload.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use std::io::{Read, Write};
use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use crate::error::{Error, Result};
use crate::models::{Country, IsoCode};
use crate::pip::BoundaryStore;

pub const MAGIC: [u8; 4] = *b"ADM0";
pub const VERSION: u16 = 1;
pub const FLAG_COMPRESSED: u16 = 1;
pub const HEADER_LEN: usize = 20;

/// Fixed-point units per degree
pub const COORD_SCALE: f64 = 1e7;

#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub compress: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { compress: true }
    }
}

/// Encode countries into a dataset blob.
///
/// The countries are validated the same way [`BoundaryStore::new`] validates
/// them, so a successful encode always decodes.
pub fn encode(countries: &[Country], options: &EncodeOptions) -> Result<Vec<u8>> {
    let store = BoundaryStore::new(countries.to_vec())?;

    let mut payload = Vec::with_capacity(16 + store.vertex_count() * 8);
    put_u32(&mut payload, store.len() as u32);
    for country in store.countries() {
        put_u16(&mut payload, country.numeric_id());
        payload.extend_from_slice(&country.iso().to_bytes());

        let name = country.name().unwrap_or("").as_bytes();
        let name_len = u16::try_from(name.len()).map_err(|_| {
            Error::corrupt(format!(
                "name of country {} is too long",
                country.numeric_id()
            ))
        })?;
        put_u16(&mut payload, name_len);
        payload.extend_from_slice(name);

        put_u32(&mut payload, country.polygons().len() as u32);
        for p in country.polygons() {
            let polygon = store.polygon(p);
            put_u32(&mut payload, polygon.rings().count() as u32);
            for ring in polygon.rings() {
                put_u32(&mut payload, ring.len() as u32);
                for c in ring {
                    put_i32(&mut payload, to_fixed(c.x));
                    put_i32(&mut payload, to_fixed(c.y));
                }
            }
        }
    }

    frame(&payload, options.compress)
}

/// Wrap a payload with the header, compressing it if requested.
pub(crate) fn frame(payload: &[u8], compress: bool) -> Result<Vec<u8>> {
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| Error::corrupt("payload exceeds 4 GiB"))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    put_u16(&mut out, VERSION);
    put_u16(&mut out, if compress { FLAG_COMPRESSED } else { 0 });
    put_u32(&mut out, payload_len);
    out.extend_from_slice(&xxh64(payload, 0).to_le_bytes());

    if compress {
        let mut encoder = ZlibEncoder::new(out, Compression::best());
        encoder.write_all(payload)?;
        out = encoder.finish()?;
    } else {
        out.extend_from_slice(payload);
    }

    debug!(
        "Encoded dataset: {} payload bytes, {} bytes framed",
        payload.len(),
        out.len()
    );
    Ok(out)
}

/// Decode a dataset blob into countries.
///
/// Only the wire format is checked here; the boundary store validates the
/// data model invariants when the countries are loaded.
pub fn decode(bytes: &[u8]) -> Result<Vec<Country>> {
    let mut header = Reader::new(bytes);
    if header.take(4)? != MAGIC {
        return Err(Error::corrupt("bad magic, not an adm0 dataset"));
    }
    let version = header.u16()?;
    if version != VERSION {
        return Err(Error::corrupt(format!(
            "unsupported dataset version {}",
            version
        )));
    }
    let flags = header.u16()?;
    if flags & !FLAG_COMPRESSED != 0 {
        return Err(Error::corrupt(format!("unknown flags {:#06x}", flags)));
    }
    let payload_len = header.u32()? as usize;
    let checksum = header.u64()?;
    let body = header.rest();

    let decompressed;
    let payload = if flags & FLAG_COMPRESSED != 0 {
        // the header length is unverified until the checksum passes
        let mut buf = Vec::with_capacity(payload_len.min(body.len().saturating_mul(64)));
        ZlibDecoder::new(body)
            .take(payload_len as u64 + 1)
            .read_to_end(&mut buf)
            .map_err(|e| Error::corrupt(format!("payload decompression failed: {}", e)))?;
        decompressed = buf;
        &decompressed[..]
    } else {
        body
    };

    if payload.len() != payload_len {
        return Err(Error::corrupt(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            payload_len
        )));
    }
    if xxh64(payload, 0) != checksum {
        return Err(Error::corrupt("payload checksum mismatch"));
    }

    let countries = decode_payload(payload)?;
    debug!("Decoded {} countries", countries.len());
    Ok(countries)
}

fn decode_payload(payload: &[u8]) -> Result<Vec<Country>> {
    let mut r = Reader::new(payload);
    let country_count = r.u32()? as usize;
    let mut countries = Vec::with_capacity(country_count.min(r.remaining() / 12));

    for _ in 0..country_count {
        let numeric_id = r.u16()?;
        let iso_bytes = [r.u8()?, r.u8()?];
        let iso_code = IsoCode::from_bytes(iso_bytes).ok_or_else(|| {
            Error::corrupt(format!("country {} has a malformed ISO code", numeric_id))
        })?;

        let name_len = r.u16()? as usize;
        let name = std::str::from_utf8(r.take(name_len)?)
            .map_err(|_| Error::corrupt(format!("country {} name is not UTF-8", numeric_id)))?;

        let polygon_count = r.u32()? as usize;
        let mut polygons = Vec::with_capacity(polygon_count.min(r.remaining() / 4));
        for _ in 0..polygon_count {
            let ring_count = r.u32()? as usize;
            if ring_count == 0 {
                return Err(Error::corrupt(format!(
                    "country {} has a polygon without rings",
                    numeric_id
                )));
            }
            let mut rings = Vec::with_capacity(ring_count.min(r.remaining() / 4));
            for _ in 0..ring_count {
                rings.push(read_ring(&mut r, numeric_id)?);
            }
            let mut rings = rings.into_iter();
            let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
            polygons.push(Polygon::new(exterior, rings.collect()));
        }

        countries.push(Country {
            numeric_id,
            iso_code,
            name: (!name.is_empty()).then(|| name.to_string()),
            geometry: MultiPolygon::new(polygons),
        });
    }

    if r.remaining() != 0 {
        return Err(Error::corrupt(format!(
            "{} trailing bytes after the last country",
            r.remaining()
        )));
    }

    Ok(countries)
}

fn read_ring(r: &mut Reader<'_>, numeric_id: u16) -> Result<LineString<f64>> {
    let vertex_count = r.u32()? as usize;
    if vertex_count < crate::pip::MIN_RING_VERTICES {
        return Err(Error::corrupt(format!(
            "country {} has a ring with {} vertices",
            numeric_id, vertex_count
        )));
    }
    let byte_len = vertex_count
        .checked_mul(8)
        .ok_or_else(|| Error::corrupt("ring too large"))?;
    let raw = r.take(byte_len)?;

    let fixed: Vec<(i32, i32)> = raw
        .chunks_exact(8)
        .map(|v| {
            (
                i32::from_le_bytes([v[0], v[1], v[2], v[3]]),
                i32::from_le_bytes([v[4], v[5], v[6], v[7]]),
            )
        })
        .collect();
    if fixed.first() != fixed.last() {
        return Err(Error::corrupt(format!(
            "country {} has an unterminated ring",
            numeric_id
        )));
    }

    Ok(LineString::new(
        fixed
            .into_iter()
            .map(|(x, y)| Coord {
                x: from_fixed(x),
                y: from_fixed(y),
            })
            .collect(),
    ))
}

fn to_fixed(degrees: f64) -> i32 {
    (degrees * COORD_SCALE).round() as i32
}

fn from_fixed(value: i32) -> f64 {
    f64::from(value) / COORD_SCALE
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Bounds-checked little-endian reader
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::corrupt(format!(
                "unexpected end of data at byte {} (wanted {} more)",
                self.pos, n
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}
