//! Command-line country lookup.
//!
//! Resolves a single coordinate, a stream of `lat,lon` lines from stdin, or
//! runs a fixed-seed throughput benchmark against a compiled dataset.

use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use adm0::{global, Config, Engine};

mod bench;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "adm0-lookup")]
#[command(about = "Resolve coordinates to countries")]
#[command(allow_negative_numbers = true)]
struct Args {
    /// Compiled dataset (defaults to dataset.path from the config)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Latitude in degrees
    lat: Option<f64>,

    /// Longitude in degrees
    lon: Option<f64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read `lat,lon` lines from stdin and print one numeric id per line
    Batch,
    /// Time lookups of uniformly distributed random points
    Benchmark {
        /// Number of timed lookups
        count: usize,
    },
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    let engine = match &args.dataset {
        Some(path) => Engine::open(path, &config.index)
            .with_context(|| format!("Failed to load dataset {}", path.display()))?,
        None => Engine::from_config(&config).context("Failed to load dataset")?,
    };
    let engine = global::init(engine)?;
    info!(
        "Loaded {} countries ({} polygons, {} vertices)",
        engine.store().len(),
        engine.store().polygon_count(),
        engine.store().vertex_count()
    );

    match (args.command, args.lat, args.lon) {
        (Some(Command::Batch), _, _) => batch(engine),
        (Some(Command::Benchmark { count }), _, _) => {
            bench::run(engine, count);
            Ok(())
        }
        (None, Some(lat), Some(lon)) => {
            if args.json {
                println!("{}", serde_json::to_string(&engine.resolve(lat, lon))?);
            } else {
                let iso = adm0::country_iso(lat, lon);
                println!(
                    "{} {}",
                    adm0::country_id(lat, lon),
                    if iso.is_empty() { "---" } else { iso }
                );
            }
            Ok(())
        }
        _ => anyhow::bail!("Expected <LAT> <LON>, `batch` or `benchmark <COUNT>`"),
    }
}

/// Points resolved per parallel batch before output is written
const BATCH_CHUNK: usize = 64 * 1024;

fn batch(engine: &Engine) -> Result<()> {
    let resolved = resolve_stream(
        engine,
        io::stdin().lock(),
        BufWriter::new(io::stdout().lock()),
        BATCH_CHUNK,
    )?;
    info!("Resolved {} points", resolved);
    Ok(())
}

/// Resolve `lat,lon` records from `input`, writing one id per line to `out`.
///
/// Records are resolved `chunk` at a time and each chunk is flushed before
/// the next is read. Unparseable lines print `0` so the output stays aligned
/// with the input.
fn resolve_stream<R: Read, W: Write>(
    engine: &Engine,
    input: R,
    mut out: W,
    chunk: usize,
) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut points = Vec::with_capacity(chunk);
    let mut resolved = 0;
    for (line, record) in reader.records().enumerate() {
        let point = record.ok().and_then(|r| {
            let lat = r.get(0)?.parse::<f64>().ok()?;
            let lon = r.get(1)?.parse::<f64>().ok()?;
            Some((lat, lon))
        });
        points.push(point.unwrap_or_else(|| {
            warn!("Line {}: expected `lat,lon`", line + 1);
            (f64::NAN, f64::NAN)
        }));

        if points.len() >= chunk {
            resolved += write_ids(engine, &mut points, &mut out)?;
        }
    }
    resolved += write_ids(engine, &mut points, &mut out)?;

    Ok(resolved)
}

fn write_ids<W: Write>(
    engine: &Engine,
    points: &mut Vec<(f64, f64)>,
    out: &mut W,
) -> Result<usize> {
    if points.is_empty() {
        return Ok(0);
    }
    for id in engine.country_ids(points) {
        writeln!(out, "{}", id)?;
    }
    out.flush()?;
    let count = points.len();
    points.clear();
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adm0::{Country, IndexConfig, IsoCode};
    use geo::polygon;
    use geo_types::MultiPolygon;

    fn engine() -> Engine {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ];
        let country = Country::new(
            7,
            IsoCode::new("QQ").unwrap(),
            MultiPolygon::new(vec![square]),
        );
        Engine::from_countries(vec![country], &IndexConfig::default()).unwrap()
    }

    /// Counts writes that end with a flush.
    #[derive(Default)]
    struct Sink {
        data: Vec<u8>,
        flushed_at: Vec<usize>,
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed_at.push(self.data.len());
            Ok(())
        }
    }

    #[test]
    fn test_stream_keeps_lines_aligned() {
        let input = "5,5\nnot a point\n20, 20\n 1.5 , 2.5 \n5\n";
        let mut sink = Sink::default();
        let resolved = resolve_stream(&engine(), input.as_bytes(), &mut sink, 1024).unwrap();
        assert_eq!(resolved, 5);
        assert_eq!(String::from_utf8(sink.data).unwrap(), "7\n0\n0\n7\n0\n");
    }

    #[test]
    fn test_stream_flushes_each_chunk() {
        let input = "1,1\n2,2\n3,3\n4,4\n5,5\n";
        let mut sink = Sink::default();
        let resolved = resolve_stream(&engine(), input.as_bytes(), &mut sink, 2).unwrap();
        assert_eq!(resolved, 5);
        // two full chunks, then the remainder
        assert_eq!(sink.flushed_at, vec![4, 8, 10]);
        assert_eq!(String::from_utf8(sink.data).unwrap(), "7\n7\n7\n7\n7\n");
    }
}
