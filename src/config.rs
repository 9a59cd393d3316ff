//! TOML configuration shared by the engine and the bundled tools.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Finest grid the index accepts, in cells per degree.
pub const MAX_CELLS_PER_DEGREE: u32 = 16;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub dataset: DatasetConfig,
}

/// Resolution of the uniform lookup grid.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct IndexConfig {
    pub cells_per_degree: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cells_per_degree: 2,
        }
    }
}

impl IndexConfig {
    pub fn new(cells_per_degree: u32) -> Self {
        Self { cells_per_degree }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CELLS_PER_DEGREE).contains(&self.cells_per_degree) {
            return Err(Error::Config(format!(
                "cells_per_degree must be between 1 and {}, got {}",
                MAX_CELLS_PER_DEGREE, self.cells_per_degree
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatasetConfig {
    /// Compiled boundary blob loaded by `Engine::from_config`
    pub path: Option<PathBuf>,
    /// Whether the compiler zlib-compresses the blob payload
    pub compress: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: None,
            compress: true,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.index.validate()?;
        Ok(config)
    }
}
