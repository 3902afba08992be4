//! Error types for the clipping engine.

use thiserror::Error;

use crate::kernels::KernelFamily;

/// Errors surfaced by kernel construction and by every per-call entry point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("(Df,Dt)=({df},{dt}) is not supported by the {family} kernels")]
    UnsupportedFactors {
        family: KernelFamily,
        df: usize,
        dt: usize,
    },

    #[error("expected {name} > 0")]
    ZeroDimension { name: &'static str },

    #[error("expected {name} divisible by {divisor}, got {value}")]
    NotDivisible {
        name: &'static str,
        value: usize,
        divisor: usize,
    },

    #[error("{buffer} stride is too small: |{stride}| < {min}")]
    StrideTooSmall {
        buffer: &'static str,
        stride: isize,
        min: usize,
    },

    #[error("{buffer} buffer is empty")]
    EmptyBuffer { buffer: &'static str },

    #[error(
        "{buffer} buffer of length {len} cannot hold {rows} rows of {cols} values at stride {stride}"
    )]
    BufferOutOfBounds {
        buffer: &'static str,
        len: usize,
        rows: usize,
        cols: usize,
        stride: isize,
    },

    #[error("expected w_cutoff >= 0, got {0}")]
    NegativeCutoff(f32),

    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("internal error: {0} is not a valid axis")]
    InvalidAxis(i32),
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad factors, dimensions or thresholds. Raised before any buffer is touched.
    Configuration,
    /// Bad buffers or strides passed to a call.
    Precondition,
    /// A value that cannot come from a valid configuration reached the engine.
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedFactors { .. }
            | Error::ZeroDimension { .. }
            | Error::NotDivisible { .. }
            | Error::NegativeCutoff(_)
            | Error::InvalidParameter { .. } => ErrorKind::Configuration,
            Error::StrideTooSmall { .. }
            | Error::EmptyBuffer { .. }
            | Error::BufferOutOfBounds { .. } => ErrorKind::Precondition,
            Error::InvalidAxis(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
