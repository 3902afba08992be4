//! Example: clip a synthetic chunk along every axis
//!
//! Builds a noisy `nfreq x nt_chunk` chunk with a few injected interference
//! features (a narrowband line, a broadband burst and a single hot cell),
//! then runs a clipper per axis and reports what each one removed.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example synthetic_clip
//! RUST_LOG=rfclip=trace cargo run --release --example synthetic_clip -- freq
//! ```
//!
//! An optional argument restricts the run to one axis (`time`, `freq` or `joint`).
//! Set `RFCLIP_LOG_DIR` to also write daily-rolling log files there.

use std::str::FromStr;

use anyhow::{Context, Result};
use common::log_setup::{setup_logging, LogConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strum::IntoEnumIterator;
use tracing::info;

use rfclip::{Axis, ClipperConfig, IntensityClipper, Strided, StridedMut};

const NFREQ: usize = 256;
const NT_CHUNK: usize = 512;

struct Chunk {
    intensity: Vec<f32>,
    weights: Vec<f32>,
}

fn synthetic_chunk(seed: u64) -> Chunk {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut intensity: Vec<f32> = (0..NFREQ * NT_CHUNK)
        .map(|_| rng.random_range(-1.0f32..1.0))
        .collect();
    let weights = vec![1.0f32; NFREQ * NT_CHUNK];

    // Narrowband line across all time samples.
    for t in 0..NT_CHUNK {
        intensity[100 * NT_CHUNK + t] += 25.0;
    }
    // Broadband burst across all frequencies.
    for f in 0..NFREQ {
        intensity[f * NT_CHUNK + 300] += 25.0;
    }
    intensity[17 * NT_CHUNK + 42] = 500.0;

    Chunk { intensity, weights }
}

fn run(axis: Axis, chunk: &Chunk) -> Result<()> {
    let config = ClipperConfig::new(NFREQ, NT_CHUNK, axis, 3.0)
        .with_downsampling(2, 2)
        .with_iterations(3, 3.0);
    let mut clipper = IntensityClipper::new(config)
        .with_context(|| format!("Failed to create {axis} clipper"))?;

    let mut weights = chunk.weights.clone();
    let report = clipper.clip(
        Strided::new(&chunk.intensity, NT_CHUNK as isize),
        StridedMut::new(&mut weights, NT_CHUNK as isize),
    )?;

    let zeroed = weights.iter().filter(|&&w| w == 0.0).count();
    info!(
        "{axis}: {} populations, rejected {} of {} coarse cells ({:.2}%), {} fine weights zeroed",
        report.populations,
        report.rejected,
        report.live,
        100.0 * report.rejected_fraction(),
        zeroed
    );
    Ok(())
}

fn main() -> Result<()> {
    let mut log_config = LogConfig::console("info");
    if let Some(dir) = std::env::var_os("RFCLIP_LOG_DIR") {
        log_config = log_config.with_log_dir(dir);
    }
    setup_logging(&log_config)?;

    let axes: Vec<Axis> = match std::env::args().nth(1) {
        Some(arg) => vec![Axis::from_str(&arg).with_context(|| format!("Unknown axis: {arg}"))?],
        None => Axis::iter().collect(),
    };

    let chunk = synthetic_chunk(2024);
    for axis in axes {
        run(axis, &chunk)?;
    }
    Ok(())
}
