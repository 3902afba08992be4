//! Clip kernels: one monomorphised routine per (axis, two-pass, Df, Dt).
//!
//! Every kernel fuses the downsample of a coarse row (or column chunk) with
//! the first statistics pass, runs the interior iterations on the scratch
//! buffer with `iter_sigma`, thresholds with `sigma` and writes the mask back
//! into the caller's fine weights.

use std::sync::OnceLock;

use crate::axis::Axis;
use crate::downsample::{reduce_block, reduce_row, BlockGeometry};
use crate::grid::{Strided, StridedMut};
use crate::kernels::{register_kernels, KernelFamily, KernelTable};
use crate::lane::{Lane, LANES};
use crate::stats::{FirstPass, Horizontal, Moments, PerLane, Reduction, WeightedBuffer};
use crate::upsample::put_mask;

pub(crate) fn family_for(axis: Axis) -> KernelFamily {
    match axis {
        Axis::Time => KernelFamily::ClipTime,
        Axis::Freq => KernelFamily::ClipFreq,
        Axis::Joint => KernelFamily::ClipJoint,
    }
}

/// Shape and thresholds shared by every clip call of one clipper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClipParams {
    pub df: usize,
    pub dt: usize,
    pub nfreq_ds: usize,
    pub nt_ds: usize,
    pub niter: usize,
    pub sigma: f32,
    pub iter_sigma: f32,
}

impl ClipParams {
    #[inline]
    fn geometry(&self) -> BlockGeometry {
        BlockGeometry {
            df: self.df,
            dt: self.dt,
            width: self.nt_ds * self.dt,
        }
    }

    /// Interior iterations, then the final threshold. Returns the final mean
    /// and threshold lanes.
    #[inline]
    fn finish<R: Reduction, const TWO_PASS: bool>(
        &self,
        buf: &mut WeightedBuffer<'_>,
        first: Moments,
    ) -> (Moments, Lane) {
        let moments = buf.iterate::<R, TWO_PASS>(first, self.niter - 1, self.iter_sigma);
        let thresh = moments.threshold(self.sigma);
        (moments, thresh)
    }
}

/// Scratch buffers owned by a clipper, sized once for its axis.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scratch {
    pub intensity: Vec<f32>,
    pub weights: Vec<f32>,
}

impl Scratch {
    pub fn for_axis(axis: Axis, df: usize, dt: usize, nfreq_ds: usize, nt_ds: usize) -> Self {
        let len = match axis {
            // Full-resolution rows are clipped in place.
            Axis::Time if df == 1 && dt == 1 => 0,
            Axis::Time => nt_ds,
            Axis::Freq => nfreq_ds * LANES,
            Axis::Joint => nfreq_ds * nt_ds,
        };
        Self {
            intensity: vec![0.0; len],
            weights: vec![0.0; len],
        }
    }
}

/// Totals over one clip call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ClipCounts {
    pub populations: usize,
    /// Coarse cells with positive weight before any masking.
    pub live: usize,
    /// Live cells that survived the final threshold.
    pub kept: usize,
}

pub(crate) trait ClipKernel: Send + Sync {
    fn clip(
        &self,
        params: &ClipParams,
        scratch: &mut Scratch,
        intensity: &Strided<'_>,
        weights: &mut StridedMut<'_>,
    ) -> ClipCounts;
}

/// One population per coarse frequency row.
struct TimeAxisClip<const DF: usize, const DT: usize, const TWO_PASS: bool>;

impl<const DF: usize, const DT: usize, const TWO_PASS: bool> TimeAxisClip<DF, DT, TWO_PASS> {
    /// `Df = Dt = 1`: the caller's rows are the statistics buffers.
    fn clip_in_place(
        params: &ClipParams,
        intensity: &Strided<'_>,
        weights: &mut StridedMut<'_>,
    ) -> ClipCounts {
        let nt = params.nt_ds;
        let mut counts = ClipCounts::default();

        for ifreq in 0..params.nfreq_ds {
            let mut buf =
                WeightedBuffer::new(intensity.row(ifreq, nt), weights.row_mut(ifreq, nt));
            let first = buf.moments::<Horizontal, TWO_PASS>();
            let (moments, thresh) = params.finish::<Horizontal, TWO_PASS>(&mut buf, first);

            for it in (0..nt).step_by(LANES) {
                let keep = buf.mask(moments.mean, thresh, it);
                buf.apply_mask(it, keep);
                counts.kept += keep.count();
            }
            counts.live += first.live;
            counts.populations += 1;
        }
        counts
    }
}

impl<const DF: usize, const DT: usize, const TWO_PASS: bool> ClipKernel
    for TimeAxisClip<DF, DT, TWO_PASS>
{
    fn clip(
        &self,
        params: &ClipParams,
        scratch: &mut Scratch,
        intensity: &Strided<'_>,
        weights: &mut StridedMut<'_>,
    ) -> ClipCounts {
        if DF == 1 && DT == 1 {
            return Self::clip_in_place(params, intensity, weights);
        }

        let geom = params.geometry();
        let mut counts = ClipCounts::default();

        for ifreq_ds in 0..params.nfreq_ds {
            let row0 = ifreq_ds * params.df;
            let mut fp = FirstPass::<Horizontal, TWO_PASS>::new();
            reduce_row::<DF, DT>(
                geom,
                intensity,
                &weights.as_strided(),
                row0,
                params.nt_ds,
                &mut scratch.intensity,
                &mut scratch.weights,
                |i, w| fp.accumulate(i, w),
            );

            let mut buf = WeightedBuffer::new(&scratch.intensity, &mut scratch.weights);
            let first = fp.finalize(&buf);
            let (moments, thresh) = params.finish::<Horizontal, TWO_PASS>(&mut buf, first);

            for it in (0..params.nt_ds).step_by(LANES) {
                let keep = buf.mask(moments.mean, thresh, it);
                counts.kept += keep.count();
                put_mask::<DF, DT>(weights, geom, row0, it, keep);
            }
            counts.live += first.live;
            counts.populations += 1;
        }
        counts
    }
}

/// One population per coarse time column, eight columns at a time.
struct FreqAxisClip<const DF: usize, const DT: usize, const TWO_PASS: bool>;

impl<const DF: usize, const DT: usize, const TWO_PASS: bool> ClipKernel
    for FreqAxisClip<DF, DT, TWO_PASS>
{
    fn clip(
        &self,
        params: &ClipParams,
        scratch: &mut Scratch,
        intensity: &Strided<'_>,
        weights: &mut StridedMut<'_>,
    ) -> ClipCounts {
        let geom = params.geometry();
        let mut counts = ClipCounts::default();

        for it_ds in (0..params.nt_ds).step_by(LANES) {
            let mut fp = FirstPass::<PerLane, TWO_PASS>::new();
            let in_w = weights.as_strided();
            for ifreq_ds in 0..params.nfreq_ds {
                let (ival, wval) =
                    reduce_block::<DF, DT>(geom, intensity, &in_w, ifreq_ds * params.df, it_ds);
                let offset = ifreq_ds * LANES;
                ival.store(&mut scratch.intensity[offset..]);
                wval.store(&mut scratch.weights[offset..]);
                fp.accumulate(ival, wval);
            }

            let mut buf = WeightedBuffer::new(&scratch.intensity, &mut scratch.weights);
            let first = fp.finalize(&buf);
            let (moments, thresh) = params.finish::<PerLane, TWO_PASS>(&mut buf, first);

            for ifreq_ds in 0..params.nfreq_ds {
                let keep = buf.mask(moments.mean, thresh, ifreq_ds * LANES);
                counts.kept += keep.count();
                put_mask::<DF, DT>(weights, geom, ifreq_ds * params.df, it_ds, keep);
            }
            counts.live += first.live;
            counts.populations += LANES;
        }
        counts
    }
}

/// A single population spanning the whole coarse grid.
struct JointClip<const DF: usize, const DT: usize, const TWO_PASS: bool>;

impl<const DF: usize, const DT: usize, const TWO_PASS: bool> ClipKernel
    for JointClip<DF, DT, TWO_PASS>
{
    fn clip(
        &self,
        params: &ClipParams,
        scratch: &mut Scratch,
        intensity: &Strided<'_>,
        weights: &mut StridedMut<'_>,
    ) -> ClipCounts {
        let geom = params.geometry();
        let nt_ds = params.nt_ds;
        let mut fp = FirstPass::<Horizontal, TWO_PASS>::new();

        let in_w = weights.as_strided();
        for ifreq_ds in 0..params.nfreq_ds {
            let offset = ifreq_ds * nt_ds;
            reduce_row::<DF, DT>(
                geom,
                intensity,
                &in_w,
                ifreq_ds * params.df,
                nt_ds,
                &mut scratch.intensity[offset..offset + nt_ds],
                &mut scratch.weights[offset..offset + nt_ds],
                |i, w| fp.accumulate(i, w),
            );
        }

        let mut buf = WeightedBuffer::new(&scratch.intensity, &mut scratch.weights);
        let first = fp.finalize(&buf);
        let (moments, thresh) = params.finish::<Horizontal, TWO_PASS>(&mut buf, first);

        let mut kept = 0;
        for ifreq_ds in 0..params.nfreq_ds {
            for it in (0..nt_ds).step_by(LANES) {
                let keep = buf.mask(moments.mean, thresh, ifreq_ds * nt_ds + it);
                kept += keep.count();
                put_mask::<DF, DT>(weights, geom, ifreq_ds * params.df, it, keep);
            }
        }

        ClipCounts {
            populations: 1,
            live: first.live,
            kept,
        }
    }
}

fn time_one_pass<const DF: usize, const DT: usize>() -> Box<dyn ClipKernel> {
    Box::new(TimeAxisClip::<DF, DT, false>)
}

fn time_two_pass<const DF: usize, const DT: usize>() -> Box<dyn ClipKernel> {
    Box::new(TimeAxisClip::<DF, DT, true>)
}

fn freq_one_pass<const DF: usize, const DT: usize>() -> Box<dyn ClipKernel> {
    Box::new(FreqAxisClip::<DF, DT, false>)
}

fn freq_two_pass<const DF: usize, const DT: usize>() -> Box<dyn ClipKernel> {
    Box::new(FreqAxisClip::<DF, DT, true>)
}

fn joint_one_pass<const DF: usize, const DT: usize>() -> Box<dyn ClipKernel> {
    Box::new(JointClip::<DF, DT, false>)
}

fn joint_two_pass<const DF: usize, const DT: usize>() -> Box<dyn ClipKernel> {
    Box::new(JointClip::<DF, DT, true>)
}

/// `[one_pass, two_pass]` tables for each axis.
pub(crate) struct ClipKernels {
    time: [KernelTable<dyn ClipKernel>; 2],
    freq: [KernelTable<dyn ClipKernel>; 2],
    joint: [KernelTable<dyn ClipKernel>; 2],
}

impl ClipKernels {
    fn build() -> Self {
        let mut time = [
            KernelTable::new(KernelFamily::ClipTime),
            KernelTable::new(KernelFamily::ClipTime),
        ];
        let mut freq = [
            KernelTable::new(KernelFamily::ClipFreq),
            KernelTable::new(KernelFamily::ClipFreq),
        ];
        let mut joint = [
            KernelTable::new(KernelFamily::ClipJoint),
            KernelTable::new(KernelFamily::ClipJoint),
        ];

        let [time_one, time_two] = &mut time;
        register_kernels!(time_one, time_one_pass, [16, 8, 4, 2, 1], [16, 8, 4, 2, 1]);
        register_kernels!(time_two, time_two_pass, [16, 8, 4, 2, 1], [16, 8, 4, 2, 1]);
        let [freq_one, freq_two] = &mut freq;
        register_kernels!(freq_one, freq_one_pass, [16, 8, 4, 2, 1], [16, 8, 4, 2, 1]);
        register_kernels!(freq_two, freq_two_pass, [16, 8, 4, 2, 1], [16, 8, 4, 2, 1]);
        let [joint_one, joint_two] = &mut joint;
        register_kernels!(joint_one, joint_one_pass, [16, 8, 4, 2, 1], [16, 8, 4, 2, 1]);
        register_kernels!(joint_two, joint_two_pass, [16, 8, 4, 2, 1], [16, 8, 4, 2, 1]);

        for table in time.iter().chain(&freq).chain(&joint) {
            tracing::debug!("Registered {} {} kernels", table.len(), table.family());
        }

        Self { time, freq, joint }
    }

    pub(crate) fn table(&self, axis: Axis, two_pass: bool) -> &KernelTable<dyn ClipKernel> {
        let tables = match axis {
            Axis::Time => &self.time,
            Axis::Freq => &self.freq,
            Axis::Joint => &self.joint,
        };
        &tables[usize::from(two_pass)]
    }
}

static KERNELS: OnceLock<ClipKernels> = OnceLock::new();

pub(crate) fn clip_kernels() -> &'static ClipKernels {
    KERNELS.get_or_init(ClipKernels::build)
}
