//! Shared helpers for the rfclip workspace: logging setup and float comparison.

pub mod float_ext;
pub mod log_setup;

/// Absolute tolerance used by [`float_ext::FloatExt::approximately_eq`].
pub const EPSILON: f64 = 1e-6;
