//! Synthetic grids and test setup shared by the unit and property tests.

use rand::rngs::StdRng;
use rand::Rng;

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Coarse-level +/-1 checkerboard over a dense `nfreq x nt` grid, constant
/// within each `df x dt` block.
pub fn checkerboard(nfreq: usize, nt: usize, df: usize, dt: usize) -> Vec<f32> {
    (0..nfreq * nt)
        .map(|idx| {
            let (f, t) = (idx / nt, idx % nt);
            if (f / df + t / dt) % 2 == 0 {
                1.0
            } else {
                -1.0
            }
        })
        .collect()
}

/// Dense grid of uniform noise in `[-amplitude, amplitude)`.
pub fn noise(rng: &mut StdRng, len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|_| rng.random_range(-amplitude..amplitude))
        .collect()
}

/// Weights in `[0.5, 1.5)` with roughly `zero_fraction` of them set to zero.
pub fn sparse_weights(rng: &mut StdRng, len: usize, zero_fraction: f64) -> Vec<f32> {
    (0..len)
        .map(|_| {
            if rng.random_bool(zero_fraction) {
                0.0
            } else {
                rng.random_range(0.5..1.5)
            }
        })
        .collect()
}

/// Transposes a dense row-major `rows x cols` grid.
pub fn transpose(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0; data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

/// Copies a dense grid into a padded buffer stored bottom-up, for reading back
/// with a stride of `-(cols + pad)`.
pub fn reversed_padded(data: &[f32], rows: usize, cols: usize, pad: usize, fill: f32) -> Vec<f32> {
    let stride = cols + pad;
    let mut out = vec![fill; rows * stride];
    for r in 0..rows {
        let dst = (rows - 1 - r) * stride;
        out[dst..dst + cols].copy_from_slice(&data[r * cols..(r + 1) * cols]);
    }
    out
}
