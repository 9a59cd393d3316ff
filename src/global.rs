//! Process-wide engine.
//!
//! The engine is published once through a [`OnceLock`]; after that every
//! query is a plain read. Before initialization the free functions answer
//! "no country".

use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

use crate::config::{Config, IndexConfig};
use crate::error::{Error, Result};
use crate::pip::Engine;
use crate::NO_COUNTRY;

static ENGINE: OnceLock<Engine> = OnceLock::new();

/// Publish `engine` as the process-wide engine.
///
/// Fails with [`Error::AlreadyInitialized`] if an engine was published before;
/// the existing engine stays in place.
pub fn init(engine: Engine) -> Result<&'static Engine> {
    let mut fresh = false;
    let published = ENGINE.get_or_init(|| {
        fresh = true;
        engine
    });
    if !fresh {
        return Err(Error::AlreadyInitialized);
    }
    info!(
        "Published global engine with {} countries",
        published.store().len()
    );
    Ok(published)
}

pub fn init_from_bytes(bytes: &[u8], config: &IndexConfig) -> Result<&'static Engine> {
    if ENGINE.get().is_some() {
        return Err(Error::AlreadyInitialized);
    }
    init(Engine::from_bytes(bytes, config)?)
}

pub fn init_from_path<P: AsRef<Path>>(path: P, config: &IndexConfig) -> Result<&'static Engine> {
    if ENGINE.get().is_some() {
        return Err(Error::AlreadyInitialized);
    }
    init(Engine::open(path, config)?)
}

pub fn init_from_config(config: &Config) -> Result<&'static Engine> {
    if ENGINE.get().is_some() {
        return Err(Error::AlreadyInitialized);
    }
    init(Engine::from_config(config)?)
}

/// The published engine, if any.
pub fn get() -> Option<&'static Engine> {
    ENGINE.get()
}

/// Numeric id of the country containing the point, `0` for none or when
/// the global engine is not initialized.
#[inline]
pub fn country_id(lat: f64, lon: f64) -> u16 {
    match ENGINE.get() {
        Some(engine) => engine.country_id(lat, lon),
        None => NO_COUNTRY,
    }
}

/// ISO code of the country containing the point, `""` for none or when
/// the global engine is not initialized.
#[inline]
pub fn country_iso(lat: f64, lon: f64) -> &'static str {
    match ENGINE.get() {
        Some(engine) => engine.country_iso(lat, lon),
        None => "",
    }
}
