//! Mask upsampling.
//!
//! Projects a coarse weight grid back onto a fine weight grid: a coarse cell
//! whose weight does not exceed the cutoff zeroes its whole `Df x Dt` block in
//! the output, and a kept cell leaves the block untouched.

use std::sync::OnceLock;

use crate::downsample::{scaled_extent, BlockGeometry};
use crate::error::{Error, Result};
use crate::grid::{Strided, StridedMut};
use crate::kernels::{register_kernels, sub_block, KernelFamily, KernelTable};
use crate::lane::{Lane, LaneMask, LANES};

/// Zeroes the fine blocks of every dropped lane among the `LANES` coarse
/// cells starting at `(row0, cell0 * dt)`.
#[inline]
pub(crate) fn put_mask<const DF: usize, const DT: usize>(
    out: &mut StridedMut<'_>,
    geom: BlockGeometry,
    row0: usize,
    cell0: usize,
    keep: LaneMask,
) {
    if keep.all() {
        return;
    }

    for sub_f in (0..geom.df).step_by(sub_block(DF)) {
        for r in 0..sub_block(DF) {
            let row = out.row_mut(row0 + sub_f + r, geom.width);
            for lane in 0..LANES {
                if keep.get(lane) {
                    continue;
                }
                let base = (cell0 + lane) * geom.dt;
                for sub_t in (0..geom.dt).step_by(sub_block(DT)) {
                    row[base + sub_t..base + sub_t + sub_block(DT)].fill(0.0);
                }
            }
        }
    }
}

pub(crate) trait UpsampleKernel: Send + Sync {
    fn upsample(
        &self,
        geom: BlockGeometry,
        nfreq_in: usize,
        nt_in: usize,
        out: &mut StridedMut<'_>,
        input: &Strided<'_>,
        w_cutoff: f32,
    );
}

struct BlockUpsample<const DF: usize, const DT: usize>;

impl<const DF: usize, const DT: usize> UpsampleKernel for BlockUpsample<DF, DT> {
    fn upsample(
        &self,
        geom: BlockGeometry,
        nfreq_in: usize,
        nt_in: usize,
        out: &mut StridedMut<'_>,
        input: &Strided<'_>,
        w_cutoff: f32,
    ) {
        let cutoff = Lane::splat(w_cutoff);
        for ifreq in 0..nfreq_in {
            let in_row = input.row(ifreq, nt_in);
            for it in (0..nt_in).step_by(LANES) {
                let keep = Lane::load(&in_row[it..]).gt(cutoff);
                put_mask::<DF, DT>(out, geom, ifreq * geom.df, it, keep);
            }
        }
    }
}

fn upsample_kernel<const DF: usize, const DT: usize>() -> Box<dyn UpsampleKernel> {
    Box::new(BlockUpsample::<DF, DT>)
}

static TABLE: OnceLock<KernelTable<dyn UpsampleKernel>> = OnceLock::new();

pub(crate) fn kernel_table() -> &'static KernelTable<dyn UpsampleKernel> {
    TABLE.get_or_init(|| {
        let mut table = KernelTable::new(KernelFamily::Upsample);
        register_kernels!(table, upsample_kernel, [8, 4, 2, 1], [16, 8, 4, 2, 1]);
        tracing::debug!("Registered {} {} kernels", table.len(), table.family());
        table
    })
}

/// Replicates coarse keep/drop decisions across `Df x Dt` fine blocks.
pub struct Upsampler {
    df: usize,
    dt: usize,
    kernel: &'static dyn UpsampleKernel,
}

impl std::fmt::Debug for Upsampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upsampler")
            .field("df", &self.df)
            .field("dt", &self.dt)
            .finish()
    }
}

impl Upsampler {
    pub fn new(df: usize, dt: usize) -> Result<Self> {
        let kernel = kernel_table().lookup(df, dt)?;
        tracing::debug!("Created upsampler (Df,Dt)=({df},{dt})");
        Ok(Self { df, dt, kernel })
    }

    pub fn df(&self) -> usize {
        self.df
    }

    pub fn dt(&self) -> usize {
        self.dt
    }

    /// ANDs the coarse mask `input > w_cutoff` (`nfreq_in x nt_in`) into the
    /// fine weights `out` (`nfreq_in * Df x nt_in * Dt`).
    ///
    /// Empty buffers are reported before strides, and strides before row
    /// bounds. The cutoff is checked last.
    pub fn upsample(
        &self,
        nfreq_in: usize,
        nt_in: usize,
        mut out: StridedMut<'_>,
        input: Strided<'_>,
        w_cutoff: f32,
    ) -> Result<()> {
        if nfreq_in == 0 {
            return Err(Error::ZeroDimension { name: "nfreq_in" });
        }
        if nt_in == 0 {
            return Err(Error::ZeroDimension { name: "nt_in" });
        }
        if nt_in % LANES != 0 {
            return Err(Error::NotDivisible {
                name: "nt_in",
                value: nt_in,
                divisor: LANES,
            });
        }

        let width = scaled_extent("dt", self.dt, nt_in)?;
        let nfreq_out = scaled_extent("df", self.df, nfreq_in)?;
        let geom = BlockGeometry {
            df: self.df,
            dt: self.dt,
            width,
        };

        out.check_nonempty("out")?;
        input.check_nonempty("in")?;
        out.check_stride("out", width)?;
        input.check_stride("in", nt_in)?;
        out.check_fits("out", nfreq_out, width)?;
        input.check_fits("in", nfreq_in, nt_in)?;

        if w_cutoff.is_nan() || w_cutoff < 0.0 {
            return Err(Error::NegativeCutoff(w_cutoff));
        }

        self.kernel
            .upsample(geom, nfreq_in, nt_in, &mut out, &input, w_cutoff);
        Ok(())
    }
}
