//! rfclip - weighted sigma clipping for frequency x time intensity grids.
//!
//! Every sample of a chunk carries an intensity and a non-negative weight; a
//! weight of zero excludes the sample. The crate provides:
//! - Weighted block downsampling by `(Df, Dt)`
//! - Mask upsampling back to full resolution
//! - Iterative sigma clipping along time, along frequency, or over the whole
//!   chunk, at full or downsampled resolution
//!
//! Every routine is dispatched through a kernel table holding one
//! monomorphised kernel per supported `(Df, Dt)` pair. Factors up to 8 must be
//! one of 1, 2, 4 or 8; larger factors must be multiples of 8.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rfclip::{Axis, ClipperConfig, IntensityClipper, Strided, StridedMut};
//!
//! let config = ClipperConfig::new(1024, 1024, Axis::Time, 3.0)
//!     .with_downsampling(2, 16)
//!     .with_iterations(3, 5.0);
//! let mut clipper = IntensityClipper::new(config)?;
//!
//! let report = clipper.clip(
//!     Strided::new(&intensity, 1024),
//!     StridedMut::new(&mut weights, 1024),
//! )?;
//! println!("rejected {} of {} cells", report.rejected, report.live);
//! ```

mod axis;
mod clipper;
mod downsample;
mod error;
mod grid;
mod kernels;
mod lane;
mod stats;
mod upsample;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

// ============================================================================
// Buffers
// ============================================================================

pub use grid::{Strided, StridedMut};
pub use lane::LANES;

// ============================================================================
// Kernels
// ============================================================================

pub use downsample::Downsampler;
pub use kernels::KernelFamily;
pub use upsample::Upsampler;

// ============================================================================
// Clipping
// ============================================================================

pub use axis::Axis;
pub use clipper::{ClipReport, ClipperConfig, IntensityClipper};

// ============================================================================
// Errors
// ============================================================================

pub use error::{Error, ErrorKind, Result};
