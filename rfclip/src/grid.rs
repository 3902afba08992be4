//! Strided row views over caller-owned buffers.
//!
//! A view is a slice plus the position of row 0 and a signed row stride, so
//! row `r` starts at `origin + r * stride`. Negative strides walk the slice
//! backwards. Views never own or resize memory; every operation validates the
//! rows it is about to touch up front and then indexes without further checks
//! beyond the slice's own.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowLayout {
    origin: usize,
    stride: isize,
}

impl RowLayout {
    /// Row 0 is the first row for forward strides and the last full row for
    /// negative ones.
    fn new(len: usize, stride: isize) -> Self {
        let step = stride.unsigned_abs();
        let origin = if stride < 0 && len > 0 && step > 0 {
            (len - 1) / step * step
        } else {
            0
        };
        Self { origin, stride }
    }

    #[inline]
    fn start(&self, row: usize) -> usize {
        let start = self.origin as isize + row as isize * self.stride;
        debug_assert!(start >= 0, "row {row} starts before the buffer");
        start as usize
    }

    /// Whether `rows` rows of `cols` values lie inside a slice of `len`.
    /// Spans that overflow `usize` never fit.
    fn fits(&self, len: usize, rows: usize, cols: usize) -> bool {
        if rows == 0 || cols == 0 {
            return true;
        }
        let Some(span) = (rows - 1).checked_mul(self.stride.unsigned_abs()) else {
            return false;
        };
        let first_row = if self.stride < 0 {
            match self.origin.checked_sub(span) {
                Some(start) => start,
                None => return false,
            }
        } else {
            self.origin
        };
        first_row
            .checked_add(span)
            .and_then(|last_row| last_row.checked_add(cols))
            .is_some_and(|end| end <= len)
    }

    fn check_nonempty(&self, buffer: &'static str, len: usize) -> Result<()> {
        if len == 0 {
            return Err(Error::EmptyBuffer { buffer });
        }
        Ok(())
    }

    fn check_stride(&self, buffer: &'static str, min_stride: usize) -> Result<()> {
        if self.stride.unsigned_abs() < min_stride {
            return Err(Error::StrideTooSmall {
                buffer,
                stride: self.stride,
                min: min_stride,
            });
        }
        Ok(())
    }

    fn check_fits(&self, buffer: &'static str, len: usize, rows: usize, cols: usize) -> Result<()> {
        if !self.fits(len, rows, cols) {
            return Err(Error::BufferOutOfBounds {
                buffer,
                len,
                rows,
                cols,
                stride: self.stride,
            });
        }
        Ok(())
    }

    fn check(
        &self,
        buffer: &'static str,
        len: usize,
        rows: usize,
        cols: usize,
        min_stride: usize,
    ) -> Result<()> {
        self.check_nonempty(buffer, len)?;
        self.check_stride(buffer, min_stride)?;
        self.check_fits(buffer, len, rows, cols)
    }
}

/// Read-only strided view.
#[derive(Debug, Clone, Copy)]
pub struct Strided<'a> {
    data: &'a [f32],
    layout: RowLayout,
}

impl<'a> Strided<'a> {
    pub fn new(data: &'a [f32], stride: isize) -> Self {
        Self {
            layout: RowLayout::new(data.len(), stride),
            data,
        }
    }

    /// View whose row 0 starts at `data[origin]`.
    pub fn with_origin(data: &'a [f32], origin: usize, stride: isize) -> Self {
        Self {
            data,
            layout: RowLayout { origin, stride },
        }
    }

    #[inline]
    pub fn stride(&self) -> isize {
        self.layout.stride
    }

    /// Checks that `rows` rows of `cols` values are addressable and that the
    /// stride spans at least `min_stride` elements.
    pub fn check(
        &self,
        buffer: &'static str,
        rows: usize,
        cols: usize,
        min_stride: usize,
    ) -> Result<()> {
        self.layout
            .check(buffer, self.data.len(), rows, cols, min_stride)
    }

    pub fn check_nonempty(&self, buffer: &'static str) -> Result<()> {
        self.layout.check_nonempty(buffer, self.data.len())
    }

    pub fn check_stride(&self, buffer: &'static str, min_stride: usize) -> Result<()> {
        self.layout.check_stride(buffer, min_stride)
    }

    pub fn check_fits(&self, buffer: &'static str, rows: usize, cols: usize) -> Result<()> {
        self.layout.check_fits(buffer, self.data.len(), rows, cols)
    }

    #[inline]
    pub fn row(&self, row: usize, cols: usize) -> &'a [f32] {
        let start = self.layout.start(row);
        &self.data[start..start + cols]
    }
}

/// Writable strided view.
#[derive(Debug)]
pub struct StridedMut<'a> {
    data: &'a mut [f32],
    layout: RowLayout,
}

impl<'a> StridedMut<'a> {
    pub fn new(data: &'a mut [f32], stride: isize) -> Self {
        Self {
            layout: RowLayout::new(data.len(), stride),
            data,
        }
    }

    pub fn with_origin(data: &'a mut [f32], origin: usize, stride: isize) -> Self {
        Self {
            data,
            layout: RowLayout { origin, stride },
        }
    }

    #[inline]
    pub fn stride(&self) -> isize {
        self.layout.stride
    }

    pub fn check(
        &self,
        buffer: &'static str,
        rows: usize,
        cols: usize,
        min_stride: usize,
    ) -> Result<()> {
        self.layout
            .check(buffer, self.data.len(), rows, cols, min_stride)
    }

    pub fn check_nonempty(&self, buffer: &'static str) -> Result<()> {
        self.layout.check_nonempty(buffer, self.data.len())
    }

    pub fn check_stride(&self, buffer: &'static str, min_stride: usize) -> Result<()> {
        self.layout.check_stride(buffer, min_stride)
    }

    pub fn check_fits(&self, buffer: &'static str, rows: usize, cols: usize) -> Result<()> {
        self.layout.check_fits(buffer, self.data.len(), rows, cols)
    }

    /// Read-only view of the same rows.
    #[inline]
    pub fn as_strided(&self) -> Strided<'_> {
        Strided {
            data: &*self.data,
            layout: self.layout,
        }
    }

    #[inline]
    pub fn row(&self, row: usize, cols: usize) -> &[f32] {
        let start = self.layout.start(row);
        &self.data[start..start + cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize, cols: usize) -> &mut [f32] {
        let start = self.layout.start(row);
        &mut self.data[start..start + cols]
    }
}
