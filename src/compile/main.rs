//! Dataset compiler.
//!
//! Imports admin-0 boundaries from GeoJSON, writes the binary dataset and
//! checks the written file by resolving an interior point of every country.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use adm0::dataset::{encode, read_countries, EncodeOptions, ImportOptions};
use adm0::{Config, Country, Engine};

#[derive(Parser, Debug)]
#[command(name = "adm0-compile")]
#[command(about = "Compile a GeoJSON country boundary file into an adm0 dataset")]
struct Args {
    /// GeoJSON FeatureCollection to import
    #[arg(short, long)]
    input: PathBuf,

    /// Output dataset (defaults to dataset.path from the config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store the payload uncompressed
    #[arg(long)]
    no_compress: bool,

    /// Property holding the ISO 3166-1 alpha-2 code
    #[arg(long, default_value = "ISO_A2_EH")]
    iso_field: String,

    /// Property holding the country name
    #[arg(long, default_value = "NAME")]
    name_field: String,

    /// Property holding the numeric id (assigned in ISO order when omitted)
    #[arg(long)]
    id_field: Option<String>,

    /// Skip resolving interior points against the written dataset
    #[arg(long)]
    skip_verify: bool,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    let output = args
        .output
        .clone()
        .or_else(|| config.dataset.path.clone())
        .context("No output path: pass --output or set dataset.path")?;

    info!("Importing {}", args.input.display());
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let options = ImportOptions {
        iso_field: args.iso_field.clone(),
        name_field: args.name_field.clone(),
        id_field: args.id_field.clone(),
    };
    let countries =
        read_countries(BufReader::new(file), &options).context("Failed to import GeoJSON")?;

    let encode_options = EncodeOptions {
        compress: config.dataset.compress && !args.no_compress,
    };
    let blob = encode(&countries, &encode_options).context("Failed to encode dataset")?;
    fs::write(&output, &blob)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        "Wrote {} countries to {} ({} bytes, compressed: {})",
        countries.len(),
        output.display(),
        blob.len(),
        encode_options.compress
    );

    if args.skip_verify {
        return Ok(());
    }

    let engine = Engine::open(&output, &config.index)
        .with_context(|| format!("Failed to reload {}", output.display()))?;
    let stats = engine.index().stats();
    info!(
        "Index at {} cells/degree: {} cells, {} occupied, {} entries ({} interior), \
         max {} / mean {:.2} candidates",
        engine.index().cells_per_degree(),
        stats.cells,
        stats.occupied_cells,
        stats.entries,
        stats.interior_entries,
        stats.max_candidates,
        stats.mean_candidates
    );

    let mismatches = verify(&engine, &countries)?;
    if mismatches > 0 {
        warn!(
            "{} of {} countries do not resolve at their interior point",
            mismatches,
            countries.len()
        );
    } else {
        info!("All {} countries verified", countries.len());
    }

    Ok(())
}

/// Resolve an interior point of every country and count the ones that come
/// back as something else. Overlapping countries can legitimately lose their
/// interior point to a lower id.
fn verify(engine: &Engine, countries: &[Country]) -> Result<usize> {
    let pb = ProgressBar::new(countries.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let mismatches = AtomicUsize::new(0);
    countries.par_iter().for_each(|country| {
        pb.inc(1);
        let Some(point) = country.interior_point() else {
            warn!("{} has no interior point", country.iso_code);
            mismatches.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let found = engine.country_id(point.y(), point.x());
        if found != country.numeric_id {
            warn!(
                "{} ({}) interior point ({:.5}, {:.5}) resolved to {}",
                country.iso_code,
                country.numeric_id,
                point.y(),
                point.x(),
                found
            );
            mismatches.fetch_add(1, Ordering::Relaxed);
        }
    });
    pb.finish_and_clear();

    Ok(mismatches.into_inner())
}
