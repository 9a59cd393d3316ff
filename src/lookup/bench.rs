//! Fixed-seed lookup benchmark.

use std::hint::black_box;
use std::time::Instant;

use adm0::Engine;

const SEED: u64 = 42;
const WARMUP: usize = 10_000;

/// SplitMix64; small, fast and reproducible across platforms.
struct SplitMix64(u64);

impl SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn random_points(count: usize) -> Vec<(f64, f64)> {
    let mut rng = SplitMix64(SEED);
    (0..count)
        .map(|_| {
            let lat = rng.next_f64() * 180.0 - 90.0;
            let lon = rng.next_f64() * 360.0 - 180.0;
            (lat, lon)
        })
        .collect()
}

pub fn run(engine: &Engine, count: usize) {
    let points = random_points(count.max(WARMUP));

    for &(lat, lon) in &points[..WARMUP] {
        black_box(engine.country_id(black_box(lat), black_box(lon)));
    }

    let start = Instant::now();
    let mut matched = 0usize;
    for &(lat, lon) in &points[..count] {
        if black_box(engine.country_id(black_box(lat), black_box(lon))) != adm0::NO_COUNTRY {
            matched += 1;
        }
    }
    let elapsed = start.elapsed();

    let per_lookup_ns = if count > 0 {
        elapsed.as_nanos() as f64 / count as f64
    } else {
        0.0
    };
    let throughput = if elapsed.as_secs_f64() > 0.0 {
        count as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    println!("lookups:    {}", count);
    println!("on land:    {}", matched);
    println!("total:      {:.3} ms", elapsed.as_secs_f64() * 1e3);
    println!("per lookup: {:.1} ns", per_lookup_ns);
    println!("throughput: {:.0} lookups/s", throughput);
}
