//! Clipper configuration.

use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::clipper::kernels::family_for;
use crate::downsample::scaled_extent;
use crate::error::{Error, Result};
use crate::lane::LANES;

/// Parameters fixed for the lifetime of an [`IntensityClipper`](super::IntensityClipper).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipperConfig {
    /// Fine frequency rows per chunk.
    pub nfreq: usize,
    /// Fine time samples per chunk.
    pub nt_chunk: usize,
    pub axis: Axis,
    /// Threshold multiplier for the final mask.
    pub sigma: f32,
    /// Threshold multiplier for interior iterations. `None` means `sigma`.
    pub iter_sigma: Option<f32>,
    /// Estimation passes, the first of which is unmasked.
    pub niter: usize,
    /// Frequency downsampling factor.
    pub df: usize,
    /// Time downsampling factor.
    pub dt: usize,
    /// Re-center before accumulating the variance.
    pub two_pass: bool,
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            nfreq: 1024,
            nt_chunk: 1024,
            axis: Axis::Time,
            sigma: 3.0,
            iter_sigma: None,
            niter: 1,
            df: 1,
            dt: 1,
            two_pass: false,
        }
    }
}

impl ClipperConfig {
    pub fn new(nfreq: usize, nt_chunk: usize, axis: Axis, sigma: f32) -> Self {
        Self {
            nfreq,
            nt_chunk,
            axis,
            sigma,
            ..Default::default()
        }
    }

    pub fn with_downsampling(mut self, df: usize, dt: usize) -> Self {
        self.df = df;
        self.dt = dt;
        self
    }

    pub fn with_iterations(mut self, niter: usize, iter_sigma: f32) -> Self {
        self.niter = niter;
        self.iter_sigma = Some(iter_sigma);
        self
    }

    pub fn with_two_pass(mut self, two_pass: bool) -> Self {
        self.two_pass = two_pass;
        self
    }

    pub fn effective_iter_sigma(&self) -> f32 {
        self.iter_sigma.unwrap_or(self.sigma)
    }

    /// Coarse frequency rows.
    pub fn nfreq_ds(&self) -> usize {
        self.nfreq / self.df
    }

    /// Coarse time samples.
    pub fn nt_ds(&self) -> usize {
        self.nt_chunk / self.dt
    }

    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.nfreq == 0 {
            return Err(Error::ZeroDimension { name: "nfreq" });
        }
        if self.nt_chunk == 0 {
            return Err(Error::ZeroDimension { name: "nt_chunk" });
        }
        if self.nt_chunk % LANES != 0 {
            return Err(Error::NotDivisible {
                name: "nt_chunk",
                value: self.nt_chunk,
                divisor: LANES,
            });
        }

        let family = family_for(self.axis);
        if !family.is_supported(self.df, self.dt) {
            return Err(Error::UnsupportedFactors {
                family,
                df: self.df,
                dt: self.dt,
            });
        }

        if self.nfreq % self.df != 0 {
            return Err(Error::NotDivisible {
                name: "nfreq",
                value: self.nfreq,
                divisor: self.df,
            });
        }
        let time_block = scaled_extent("dt", self.dt, LANES)?;
        if self.nt_chunk % time_block != 0 {
            return Err(Error::NotDivisible {
                name: "nt_chunk",
                value: self.nt_chunk,
                divisor: time_block,
            });
        }
        if self.nfreq.checked_mul(self.nt_chunk).is_none() {
            return Err(Error::InvalidParameter {
                name: "nfreq",
                value: self.nfreq as f64,
                reason: "nfreq * nt_chunk overflows usize",
            });
        }

        check_sigma("sigma", self.sigma)?;
        check_sigma("iter_sigma", self.effective_iter_sigma())?;

        if self.niter == 0 {
            return Err(Error::ZeroDimension { name: "niter" });
        }
        Ok(())
    }
}

fn check_sigma(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name,
            value: value as f64,
            reason: "must be finite and positive",
        })
    }
}
