//! Iterative sigma clipper.
//!
//! Each call downsamples the chunk by `(Df, Dt)`, estimates a weighted mean and
//! variance per population (per coarse row, per coarse column or over the
//! whole coarse grid depending on [`Axis`]), re-estimates `niter - 1` times
//! after masking at `iter_sigma`, and finally zeroes the fine weights of every
//! coarse cell that falls outside `mean +/- sigma * rms`.

mod config;
mod kernels;

pub use config::ClipperConfig;

use crate::axis::Axis;
use crate::error::Result;
use crate::grid::{Strided, StridedMut};
use kernels::{clip_kernels, ClipKernel, ClipParams, Scratch};

/// Outcome of one [`IntensityClipper::clip`] call, counted at coarse resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipReport {
    /// Independent statistics populations that were estimated.
    pub populations: usize,
    /// Coarse cells with positive weight on entry.
    pub live: usize,
    /// Live coarse cells whose weight was zeroed, by interior iterations or
    /// by the final threshold.
    pub rejected: usize,
}

impl ClipReport {
    pub fn rejected_fraction(&self) -> f64 {
        if self.live == 0 {
            0.0
        } else {
            self.rejected as f64 / self.live as f64
        }
    }
}

pub struct IntensityClipper {
    config: ClipperConfig,
    params: ClipParams,
    kernel: &'static dyn ClipKernel,
    scratch: Scratch,
}

impl std::fmt::Debug for IntensityClipper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntensityClipper")
            .field("config", &self.config)
            .finish()
    }
}

impl IntensityClipper {
    /// Validates `config`, resolves its kernel and allocates scratch space.
    pub fn new(config: ClipperConfig) -> Result<Self> {
        config.validate()?;

        let kernel = clip_kernels()
            .table(config.axis, config.two_pass)
            .lookup(config.df, config.dt)?;

        let params = ClipParams {
            df: config.df,
            dt: config.dt,
            nfreq_ds: config.nfreq_ds(),
            nt_ds: config.nt_ds(),
            niter: config.niter,
            sigma: config.sigma,
            iter_sigma: config.effective_iter_sigma(),
        };
        let scratch = Scratch::for_axis(
            config.axis,
            config.df,
            config.dt,
            params.nfreq_ds,
            params.nt_ds,
        );

        tracing::debug!(
            "Created {} clipper: nfreq={}, nt_chunk={}, (Df,Dt)=({},{}), sigma={}, iter_sigma={}, niter={}, two_pass={}",
            config.axis,
            config.nfreq,
            config.nt_chunk,
            config.df,
            config.dt,
            params.sigma,
            params.iter_sigma,
            params.niter,
            config.two_pass
        );

        Ok(Self {
            config,
            params,
            kernel,
            scratch,
        })
    }

    pub fn config(&self) -> &ClipperConfig {
        &self.config
    }

    pub fn axis(&self) -> Axis {
        self.config.axis
    }

    /// Clips one `nfreq x nt_chunk` chunk, zeroing rejected weights in place.
    ///
    /// Both views are validated before any statistics are computed.
    pub fn clip(
        &mut self,
        intensity: Strided<'_>,
        mut weights: StridedMut<'_>,
    ) -> Result<ClipReport> {
        let (nfreq, nt) = (self.config.nfreq, self.config.nt_chunk);
        intensity.check("intensity", nfreq, nt, nt)?;
        weights.check("weights", nfreq, nt, nt)?;

        let counts = self
            .kernel
            .clip(&self.params, &mut self.scratch, &intensity, &mut weights);

        let report = ClipReport {
            populations: counts.populations,
            live: counts.live,
            rejected: counts.live.saturating_sub(counts.kept),
        };

        tracing::trace!(
            "{} clip: {} populations, {} of {} live cells rejected",
            self.config.axis,
            report.populations,
            report.rejected,
            report.live
        );
        if report.rejected * 2 > report.live {
            tracing::warn!(
                "{} clip rejected {:.1}% of live cells ({} of {}) - sigma={} may be too aggressive",
                self.config.axis,
                100.0 * report.rejected_fraction(),
                report.rejected,
                report.live,
                self.params.sigma
            );
        }

        Ok(report)
    }
}
