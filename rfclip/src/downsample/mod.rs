//! Weighted block downsampling.
//!
//! Each output cell is the weighted average of a `Df x Dt` block of input
//! cells: the output weight is the block's summed weight and the output
//! intensity is `sum(w * i) / sum(w)`, or zero for a block with no weight.

use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::grid::{Strided, StridedMut};
use crate::kernels::{register_kernels, sub_block, KernelFamily, KernelTable};
use crate::lane::{Lane, LANES};

/// Factors of a fine grid block and the width of a fine row in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockGeometry {
    pub df: usize,
    pub dt: usize,
    pub width: usize,
}

/// Reduces the `LANES` consecutive blocks whose top-left fine cell is
/// `(row0, cell0 * dt)`, returning the averaged intensities and summed weights.
///
/// `DF`/`DT` are the registry buckets. For buckets below 8 they equal the real
/// factors; for larger buckets the real factor is walked in sub-blocks of 8.
#[inline]
pub(crate) fn reduce_block<const DF: usize, const DT: usize>(
    geom: BlockGeometry,
    in_i: &Strided<'_>,
    in_w: &Strided<'_>,
    row0: usize,
    cell0: usize,
) -> (Lane, Lane) {
    let mut wsum = [0.0f32; LANES];
    let mut wisum = [0.0f32; LANES];

    for sub_f in (0..geom.df).step_by(sub_block(DF)) {
        for r in 0..sub_block(DF) {
            let row_i = in_i.row(row0 + sub_f + r, geom.width);
            let row_w = in_w.row(row0 + sub_f + r, geom.width);

            for lane in 0..LANES {
                let base = (cell0 + lane) * geom.dt;
                for sub_t in (0..geom.dt).step_by(sub_block(DT)) {
                    for k in 0..sub_block(DT) {
                        let w = row_w[base + sub_t + k];
                        if w > 0.0 {
                            wsum[lane] += w;
                            wisum[lane] += w * row_i[base + sub_t + k];
                        }
                    }
                }
            }
        }
    }

    let wsum = Lane::from_array(wsum);
    (Lane::from_array(wisum).div_or_zero(wsum), wsum)
}

/// `factor * extent` as a fine-grid extent, or a configuration error when the
/// product does not fit in `usize`.
pub(crate) fn scaled_extent(name: &'static str, factor: usize, extent: usize) -> Result<usize> {
    factor
        .checked_mul(extent)
        .ok_or(Error::InvalidParameter {
            name,
            value: factor as f64,
            reason: "scaled grid extent overflows usize",
        })
}

/// Downsamples one coarse row of `nt_out` cells into `out_i`/`out_w`, handing
/// every finished lane to `sink`.
#[inline]
#[allow(clippy::too_many_arguments)]
pub(crate) fn reduce_row<const DF: usize, const DT: usize>(
    geom: BlockGeometry,
    in_i: &Strided<'_>,
    in_w: &Strided<'_>,
    row0: usize,
    nt_out: usize,
    out_i: &mut [f32],
    out_w: &mut [f32],
    mut sink: impl FnMut(Lane, Lane),
) {
    for it in (0..nt_out).step_by(LANES) {
        let (ival, wval) = reduce_block::<DF, DT>(geom, in_i, in_w, row0, it);
        ival.store(&mut out_i[it..]);
        wval.store(&mut out_w[it..]);
        sink(ival, wval);
    }
}

pub(crate) trait DownsampleKernel: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn downsample(
        &self,
        geom: BlockGeometry,
        nfreq_out: usize,
        nt_out: usize,
        out_i: &mut StridedMut<'_>,
        out_w: &mut StridedMut<'_>,
        in_i: &Strided<'_>,
        in_w: &Strided<'_>,
    );
}

struct BlockDownsample<const DF: usize, const DT: usize>;

impl<const DF: usize, const DT: usize> DownsampleKernel for BlockDownsample<DF, DT> {
    #[allow(clippy::too_many_arguments)]
    fn downsample(
        &self,
        geom: BlockGeometry,
        nfreq_out: usize,
        nt_out: usize,
        out_i: &mut StridedMut<'_>,
        out_w: &mut StridedMut<'_>,
        in_i: &Strided<'_>,
        in_w: &Strided<'_>,
    ) {
        for ifreq in 0..nfreq_out {
            reduce_row::<DF, DT>(
                geom,
                in_i,
                in_w,
                ifreq * geom.df,
                nt_out,
                out_i.row_mut(ifreq, nt_out),
                out_w.row_mut(ifreq, nt_out),
                |_, _| {},
            );
        }
    }
}

fn downsample_kernel<const DF: usize, const DT: usize>() -> Box<dyn DownsampleKernel> {
    Box::new(BlockDownsample::<DF, DT>)
}

static TABLE: OnceLock<KernelTable<dyn DownsampleKernel>> = OnceLock::new();

pub(crate) fn kernel_table() -> &'static KernelTable<dyn DownsampleKernel> {
    TABLE.get_or_init(|| {
        let mut table = KernelTable::new(KernelFamily::Downsample);
        register_kernels!(table, downsample_kernel, [16, 8, 4, 2, 1], [16, 8, 4, 2, 1]);
        tracing::debug!("Registered {} {} kernels", table.len(), table.family());
        table
    })
}

/// Weighted `Df x Dt` block downsampler with its kernel resolved at construction.
pub struct Downsampler {
    df: usize,
    dt: usize,
    kernel: &'static dyn DownsampleKernel,
}

impl std::fmt::Debug for Downsampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downsampler")
            .field("df", &self.df)
            .field("dt", &self.dt)
            .finish()
    }
}

impl Downsampler {
    /// Fails immediately if `(df, dt)` has no kernel.
    pub fn new(df: usize, dt: usize) -> Result<Self> {
        let kernel = kernel_table().lookup(df, dt)?;
        tracing::debug!("Created downsampler (Df,Dt)=({df},{dt})");
        Ok(Self { df, dt, kernel })
    }

    pub fn df(&self) -> usize {
        self.df
    }

    pub fn dt(&self) -> usize {
        self.dt
    }

    /// Downsamples `nfreq_out * Df` fine rows of `nt_out * Dt` values into
    /// `nfreq_out` coarse rows of `nt_out` values.
    ///
    /// All shape and buffer checks run before anything is written: strides
    /// first, then empty buffers, then row bounds.
    pub fn downsample(
        &self,
        nfreq_out: usize,
        nt_out: usize,
        mut out_i: StridedMut<'_>,
        mut out_w: StridedMut<'_>,
        in_i: Strided<'_>,
        in_w: Strided<'_>,
    ) -> Result<()> {
        if nfreq_out == 0 {
            return Err(Error::ZeroDimension { name: "nfreq_out" });
        }
        if nt_out == 0 {
            return Err(Error::ZeroDimension { name: "nt_out" });
        }
        if nt_out % LANES != 0 {
            return Err(Error::NotDivisible {
                name: "nt_out",
                value: nt_out,
                divisor: LANES,
            });
        }

        let width = scaled_extent("dt", self.dt, nt_out)?;
        let nfreq_in = scaled_extent("df", self.df, nfreq_out)?;
        let geom = BlockGeometry {
            df: self.df,
            dt: self.dt,
            width,
        };

        in_i.check_stride("in_i", width)?;
        in_w.check_stride("in_w", width)?;
        out_i.check_stride("out_i", nt_out)?;
        out_w.check_stride("out_w", nt_out)?;

        out_i.check_nonempty("out_i")?;
        out_w.check_nonempty("out_w")?;
        in_i.check_nonempty("in_i")?;
        in_w.check_nonempty("in_w")?;

        in_i.check_fits("in_i", nfreq_in, width)?;
        in_w.check_fits("in_w", nfreq_in, width)?;
        out_i.check_fits("out_i", nfreq_out, nt_out)?;
        out_w.check_fits("out_w", nfreq_out, nt_out)?;

        self.kernel.downsample(
            geom, nfreq_out, nt_out, &mut out_i, &mut out_w, &in_i, &in_w,
        );
        Ok(())
    }
}
