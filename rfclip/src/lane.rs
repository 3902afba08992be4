//! Fixed-width f32 lanes.
//!
//! Every kernel in this crate is written against an 8-wide lane of f32. The
//! lanes are plain arrays; all operations are element-wise loops over a
//! compile-time length, which the compiler auto-vectorizes effectively.

use std::array;
use std::ops::{Add, AddAssign, BitAnd, Mul, Sub};

/// Number of f32 values processed together.
pub const LANES: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Lane([f32; LANES]);

impl Lane {
    pub const ZERO: Lane = Lane([0.0; LANES]);

    #[inline]
    pub const fn splat(value: f32) -> Self {
        Self([value; LANES])
    }

    #[inline]
    pub const fn from_array(values: [f32; LANES]) -> Self {
        Self(values)
    }

    /// Loads `LANES` consecutive values starting at `src[0]`.
    #[inline]
    pub fn load(src: &[f32]) -> Self {
        let mut values = [0.0; LANES];
        values.copy_from_slice(&src[..LANES]);
        Self(values)
    }

    /// Stores the lane into `dst[..LANES]`.
    #[inline]
    pub fn store(self, dst: &mut [f32]) {
        dst[..LANES].copy_from_slice(&self.0);
    }

    #[cfg(test)]
    pub fn as_array(&self) -> &[f32; LANES] {
        &self.0
    }

    #[inline]
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self(self.0.map(f))
    }

    #[inline]
    fn zip(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Self(array::from_fn(|i| f(self.0[i], other.0[i])))
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        self.map(f32::sqrt)
    }

    #[inline]
    pub fn abs(self) -> Self {
        self.map(f32::abs)
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        self.zip(other, f32::max)
    }

    #[inline]
    pub fn horizontal_sum(self) -> f32 {
        // Pairwise, matching the usual shuffle-and-add reduction order.
        let [a, b, c, d, e, f, g, h] = self.0;
        ((a + e) + (c + g)) + ((b + f) + (d + h))
    }

    /// `self / denom` where `denom > 0`, zero elsewhere.
    #[inline]
    pub fn div_or_zero(self, denom: Self) -> Self {
        self.zip(denom, |n, d| if d > 0.0 { n / d } else { 0.0 })
    }

    #[inline]
    pub fn gt(self, other: Self) -> LaneMask {
        LaneMask(array::from_fn(|i| self.0[i] > other.0[i]))
    }

    #[inline]
    pub fn le(self, other: Self) -> LaneMask {
        LaneMask(array::from_fn(|i| self.0[i] <= other.0[i]))
    }
}

impl Add for Lane {
    type Output = Lane;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        self.zip(rhs, |a, b| a + b)
    }
}

impl AddAssign for Lane {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Lane {
    type Output = Lane;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.zip(rhs, |a, b| a - b)
    }
}

impl Mul for Lane {
    type Output = Lane;

    #[inline]
    fn mul(self, rhs: Self) -> Self::Output {
        self.zip(rhs, |a, b| a * b)
    }
}

/// Per-lane keep/drop decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneMask([bool; LANES]);

impl LaneMask {
    #[cfg(test)]
    pub const NONE: LaneMask = LaneMask([false; LANES]);

    #[cfg(test)]
    pub const fn from_array(values: [bool; LANES]) -> Self {
        LaneMask(values)
    }

    #[inline]
    pub fn get(&self, lane: usize) -> bool {
        self.0[lane]
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&keep| keep).count()
    }

    #[inline]
    pub fn all(&self) -> bool {
        self.0.iter().all(|&keep| keep)
    }

    /// Keeps `value` where the mask is set, zero elsewhere.
    #[inline]
    pub fn select(self, value: Lane) -> Lane {
        Lane(array::from_fn(|i| if self.0[i] { value.0[i] } else { 0.0 }))
    }
}

impl BitAnd for LaneMask {
    type Output = LaneMask;

    #[inline]
    fn bitand(self, rhs: Self) -> Self::Output {
        LaneMask(array::from_fn(|i| self.0[i] && rhs.0[i]))
    }
}
