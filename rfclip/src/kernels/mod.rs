//! Kernel registry.
//!
//! Each kernel family keeps one table mapping a `(Df, Dt)` bucket to a kernel
//! monomorphised for exactly that pair, so the innermost block loops run over
//! compile-time bounds. The set of buckets is closed: `{16, 8, 4, 2, 1}` on
//! each axis (`{8, 4, 2, 1}` for `Df` in the upsample family). Factors above 8
//! are folded into the largest bucket, whose kernels iterate over the real
//! factor in sub-blocks of 8.
//!
//! Tables are built on first use behind a `OnceLock` and are read-only
//! afterwards.

use hashbrown::HashMap;
use strum_macros::{Display, EnumIter};

use crate::error::{Error, Result};

/// Bucket values every table is populated with, largest first.
pub(crate) const FACTOR_BUCKETS: [usize; 5] = [16, 8, 4, 2, 1];

/// Largest factor handled without splitting into sub-blocks of 8.
pub(crate) const SUB_BLOCK: usize = 8;

/// Inner-loop length for a kernel bucket: the bucket itself below 8, 8 above.
#[inline]
pub(crate) const fn sub_block(bucket: usize) -> usize {
    if bucket < SUB_BLOCK {
        bucket
    } else {
        SUB_BLOCK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum KernelFamily {
    #[strum(to_string = "downsample")]
    Downsample,
    #[strum(to_string = "upsample")]
    Upsample,
    #[strum(to_string = "clip-taxis")]
    ClipTime,
    #[strum(to_string = "clip-faxis")]
    ClipFreq,
    #[strum(to_string = "clip-naxis")]
    ClipJoint,
}

impl KernelFamily {
    /// Bucket that frequency factors above 8 fold into.
    ///
    /// The upsampler writes masks eight rows at a time for any large `Df`,
    /// while the others keep a dedicated 16 bucket.
    pub fn df_bucket_max(self) -> usize {
        match self {
            KernelFamily::Upsample => 8,
            _ => 16,
        }
    }

    /// Maps a runtime factor pair onto the bucket pair its kernel is registered under.
    pub fn fold(self, df: usize, dt: usize) -> Result<(usize, usize)> {
        let unsupported = || Error::UnsupportedFactors {
            family: self,
            df,
            dt,
        };

        if df == 0 || dt == 0 {
            return Err(unsupported());
        }

        let df_bucket = if df > SUB_BLOCK {
            if df % SUB_BLOCK != 0 {
                return Err(unsupported());
            }
            self.df_bucket_max()
        } else {
            df
        };

        let dt_bucket = if dt > SUB_BLOCK {
            if dt % SUB_BLOCK != 0 {
                return Err(unsupported());
            }
            16
        } else {
            dt
        };

        Ok((df_bucket, dt_bucket))
    }

    pub fn is_supported(self, df: usize, dt: usize) -> bool {
        self.fold(df, dt)
            .map(|key| self.registered_pairs().contains(&key))
            .unwrap_or(false)
    }

    /// Every `(Df, Dt)` bucket this family has a kernel for.
    pub fn registered_pairs(self) -> Vec<(usize, usize)> {
        let df_max = self.df_bucket_max();
        FACTOR_BUCKETS
            .iter()
            .filter(|&&df| df <= df_max)
            .flat_map(|&df| FACTOR_BUCKETS.iter().map(move |&dt| (df, dt)))
            .collect()
    }
}

/// Immutable `(Df, Dt)` → kernel mapping for one family.
pub(crate) struct KernelTable<K: ?Sized> {
    family: KernelFamily,
    entries: HashMap<(usize, usize), Box<K>>,
}

impl<K: ?Sized> KernelTable<K> {
    pub(crate) fn new(family: KernelFamily) -> Self {
        Self {
            family,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, df: usize, dt: usize, kernel: Box<K>) {
        let previous = self.entries.insert((df, dt), kernel);
        debug_assert!(
            previous.is_none(),
            "{} kernel ({df},{dt}) registered twice",
            self.family
        );
    }

    pub(crate) fn family(&self) -> KernelFamily {
        self.family
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, df: usize, dt: usize) -> bool {
        self.entries.contains_key(&(df, dt))
    }

    /// Returns the kernel for a runtime factor pair, folding large factors first.
    pub(crate) fn lookup(&self, df: usize, dt: usize) -> Result<&K> {
        let key = self.family.fold(df, dt)?;
        self.entries
            .get(&key)
            .map(|kernel| kernel.as_ref())
            .ok_or(Error::UnsupportedFactors {
                family: self.family,
                df,
                dt,
            })
    }
}

/// Registers `$ctor::<Df, Dt>()` for every pair in the cross product of the two
/// factor lists.
macro_rules! register_kernels {
    ($table:ident, $ctor:ident, [$($df:literal),+ $(,)?], $dts:tt) => {
        $( register_kernels!(@row $table, $ctor, $df, $dts); )+
    };
    (@row $table:ident, $ctor:ident, $df:literal, [$($dt:literal),+ $(,)?]) => {
        $( $table.insert($df, $dt, $ctor::<$df, $dt>()); )+
    };
}

pub(crate) use register_kernels;
