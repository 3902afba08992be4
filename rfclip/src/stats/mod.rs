//! Running weighted mean/variance over lane-aligned `(intensity, weight)` buffers.
//!
//! A buffer holds one or more populations. With [`Horizontal`] reduction every
//! value in the buffer belongs to a single population and the moments are
//! splatted across the lane. With [`PerLane`] reduction lane `j` of every chunk
//! belongs to population `j`, so eight populations are tracked side by side.
//!
//! Samples with `w <= 0` are excluded everywhere, including from the live count.

use std::marker::PhantomData;

use crate::lane::{Lane, LaneMask, LANES};

/// Folds per-lane partial sums into the value each lane's population sees.
pub(crate) trait Reduction {
    fn reduce(partial: Lane) -> Lane;
}

/// One population spanning the whole buffer.
pub(crate) struct Horizontal;

impl Reduction for Horizontal {
    #[inline]
    fn reduce(partial: Lane) -> Lane {
        Lane::splat(partial.horizontal_sum())
    }
}

/// Eight interleaved populations, one per lane.
pub(crate) struct PerLane;

impl Reduction for PerLane {
    #[inline]
    fn reduce(partial: Lane) -> Lane {
        partial
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Moments {
    pub mean: Lane,
    pub var: Lane,
    /// Samples with positive weight that went into the estimate.
    pub live: usize,
}

impl Moments {
    #[inline]
    pub fn threshold(&self, sigma: f32) -> Lane {
        Lane::splat(sigma) * self.var.sqrt()
    }
}

/// Accumulator for the first statistics pass.
///
/// In one-pass mode the second moment is accumulated directly and the
/// variance is `E[w i^2] / E[w] - mean^2`. In two-pass mode only the mean is
/// accumulated here and [`FirstPass::finalize`] re-reads the buffer to sum
/// squared deviations from it.
pub(crate) struct FirstPass<R, const TWO_PASS: bool> {
    w: Lane,
    wi: Lane,
    wii: Lane,
    live: usize,
    _reduction: PhantomData<R>,
}

impl<R: Reduction, const TWO_PASS: bool> Default for FirstPass<R, TWO_PASS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Reduction, const TWO_PASS: bool> FirstPass<R, TWO_PASS> {
    pub fn new() -> Self {
        Self {
            w: Lane::ZERO,
            wi: Lane::ZERO,
            wii: Lane::ZERO,
            live: 0,
            _reduction: PhantomData,
        }
    }

    #[inline]
    pub fn accumulate(&mut self, i: Lane, w: Lane) {
        let live = w.gt(Lane::ZERO);
        let w = live.select(w);
        let wi = live.select(w * i);

        self.w += w;
        self.wi += wi;
        if !TWO_PASS {
            self.wii += live.select(wi * i);
        }
        self.live += live.count();
    }

    /// Accumulates every lane of `buf`, then finalizes.
    pub fn run(mut self, buf: &WeightedBuffer<'_>) -> Moments {
        for offset in (0..buf.len()).step_by(LANES) {
            let (i, w) = buf.load(offset);
            self.accumulate(i, w);
        }
        self.finalize(buf)
    }

    /// `buf` must hold exactly the samples that were accumulated.
    pub fn finalize(self, buf: &WeightedBuffer<'_>) -> Moments {
        let w = R::reduce(self.w);
        let mean = R::reduce(self.wi).div_or_zero(w);

        let var = if TWO_PASS {
            let mut wdd = Lane::ZERO;
            for offset in (0..buf.len()).step_by(LANES) {
                let (i, wl) = buf.load(offset);
                let live = wl.gt(Lane::ZERO);
                let d = i - mean;
                wdd += live.select(wl * d * d);
            }
            R::reduce(wdd).div_or_zero(w)
        } else {
            R::reduce(self.wii).div_or_zero(w) - mean * mean
        };

        Moments {
            mean,
            // Cancellation in the one-pass form can leave a tiny negative residue.
            var: var.max(Lane::ZERO),
            live: self.live,
        }
    }
}

/// Lane-aligned intensity/weight pair that iteration may mask in place.
pub(crate) struct WeightedBuffer<'a> {
    intensity: &'a [f32],
    weights: &'a mut [f32],
}

impl<'a> WeightedBuffer<'a> {
    pub fn new(intensity: &'a [f32], weights: &'a mut [f32]) -> Self {
        debug_assert_eq!(intensity.len(), weights.len());
        debug_assert_eq!(intensity.len() % LANES, 0);
        Self { intensity, weights }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    #[inline]
    fn load(&self, offset: usize) -> (Lane, Lane) {
        (
            Lane::load(&self.intensity[offset..]),
            Lane::load(&self.weights[offset..]),
        )
    }

    pub fn moments<R: Reduction, const TWO_PASS: bool>(&self) -> Moments {
        FirstPass::<R, TWO_PASS>::new().run(self)
    }

    /// Runs `niter` rounds of: zero every weight outside
    /// `mean +/- iter_sigma * sqrt(var)`, then re-estimate from the survivors.
    pub fn iterate<R: Reduction, const TWO_PASS: bool>(
        &mut self,
        mut moments: Moments,
        niter: usize,
        iter_sigma: f32,
    ) -> Moments {
        for _ in 0..niter {
            let thresh = moments.threshold(iter_sigma);
            let mut fp = FirstPass::<R, TWO_PASS>::new();
            for offset in (0..self.len()).step_by(LANES) {
                let keep = self.mask(moments.mean, thresh, offset);
                self.apply_mask(offset, keep);
                let (i, w) = self.load(offset);
                fp.accumulate(i, w);
            }
            moments = fp.finalize(self);
        }
        moments
    }

    /// True where `w > 0` and `|i - mean| <= thresh` for the lane at `offset`.
    #[inline]
    pub fn mask(&self, mean: Lane, thresh: Lane, offset: usize) -> LaneMask {
        let (i, w) = self.load(offset);
        w.gt(Lane::ZERO) & (i - mean).abs().le(thresh)
    }

    #[inline]
    pub fn apply_mask(&mut self, offset: usize, keep: LaneMask) {
        let w = Lane::load(&self.weights[offset..]);
        keep.select(w).store(&mut self.weights[offset..]);
    }
}

#[cfg(test)]
mod tests;
