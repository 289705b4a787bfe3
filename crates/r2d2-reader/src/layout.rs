//! Byte-level layout of R2D2 binary products.
//!
//! Every binary product is a flat sequence of fixed-width numbers in the
//! byte order chosen by the `swap` run parameter. Multi-dimensional blocks
//! are stored in Fortran (column-major) order.

use std::path::Path;

use bytes::{Buf, BufMut};
use ndarray::{ArrayViewMut, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};

/// Byte order of a run's binary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order selected by the `swap` parameter (0 = little endian).
    pub fn from_swap_flag(swap: i64) -> Self {
        if swap == 0 {
            Self::Little
        } else {
            Self::Big
        }
    }

    /// The `swap` parameter value for this byte order.
    pub fn swap_flag(&self) -> i64 {
        match self {
            Self::Little => 0,
            Self::Big => 1,
        }
    }

    /// Decode `count` `f32` values from the start of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` holds fewer than `count * 4` bytes. Use
    /// [`RecordReader`] for length-checked reads.
    pub fn decode_f32(&self, buf: &[u8], count: usize) -> Vec<f32> {
        let mut cur = &buf[..count * 4];
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(match self {
                Self::Little => cur.get_f32_le(),
                Self::Big => cur.get_f32(),
            });
        }
        out
    }

    /// Decode `count` `f64` values from the start of `buf`.
    pub fn decode_f64(&self, buf: &[u8], count: usize) -> Vec<f64> {
        let mut cur = &buf[..count * 8];
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(match self {
                Self::Little => cur.get_f64_le(),
                Self::Big => cur.get_f64(),
            });
        }
        out
    }

    /// Decode `count` `i32` values from the start of `buf`.
    pub fn decode_i32(&self, buf: &[u8], count: usize) -> Vec<i32> {
        let mut cur = &buf[..count * 4];
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(match self {
                Self::Little => cur.get_i32_le(),
                Self::Big => cur.get_i32(),
            });
        }
        out
    }

    /// Lazily decode the `f32` values of `buf`, ignoring a trailing partial value.
    pub fn f32_values<'b>(&self, buf: &'b [u8]) -> impl Iterator<Item = f32> + 'b {
        let order = *self;
        buf.chunks_exact(4).map(move |mut c| match order {
            Self::Little => c.get_f32_le(),
            Self::Big => c.get_f32(),
        })
    }

    /// Lazily decode the `f64` values of `buf`, ignoring a trailing partial value.
    pub fn f64_values<'b>(&self, buf: &'b [u8]) -> impl Iterator<Item = f64> + 'b {
        let order = *self;
        buf.chunks_exact(8).map(move |mut c| match order {
            Self::Little => c.get_f64_le(),
            Self::Big => c.get_f64(),
        })
    }

    /// Append `f64` values to `out`.
    pub fn encode_f64<B: BufMut>(&self, out: &mut B, values: impl IntoIterator<Item = f64>) {
        for v in values {
            match self {
                Self::Little => out.put_f64_le(v),
                Self::Big => out.put_f64(v),
            }
        }
    }

    /// Append `f32` values to `out`.
    pub fn encode_f32<B: BufMut>(&self, out: &mut B, values: impl IntoIterator<Item = f32>) {
        for v in values {
            match self {
                Self::Little => out.put_f32_le(v),
                Self::Big => out.put_f32(v),
            }
        }
    }
}

/// Sequential reader over a binary record that reports truncation with the
/// originating path.
pub struct RecordReader<'a> {
    path: &'a Path,
    buf: &'a [u8],
    offset: usize,
    order: ByteOrder,
}

impl<'a> RecordReader<'a> {
    pub fn new(path: &'a Path, buf: &'a [u8], order: ByteOrder) -> Self {
        Self {
            path,
            buf,
            offset: 0,
            order,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.offset
    }

    fn take(&mut self, nbytes: usize) -> Result<&'a [u8]> {
        let end = self.offset + nbytes;
        if end > self.buf.len() {
            return Err(ReaderError::Truncated {
                path: self.path.to_path_buf(),
                expected: end,
                found: self.buf.len(),
            });
        }
        let slice = &self.buf[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Borrow the next `nbytes` bytes without decoding them.
    pub fn raw(&mut self, nbytes: usize) -> Result<&'a [u8]> {
        self.take(nbytes)
    }

    pub fn f32s(&mut self, count: usize) -> Result<Vec<f32>> {
        let order = self.order;
        Ok(order.decode_f32(self.take(count * 4)?, count))
    }

    pub fn f64s(&mut self, count: usize) -> Result<Vec<f64>> {
        let order = self.order;
        Ok(order.decode_f64(self.take(count * 8)?, count))
    }

    pub fn i32s(&mut self, count: usize) -> Result<Vec<i32>> {
        let order = self.order;
        Ok(order.decode_i32(self.take(count * 4)?, count))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.i32s(1)?[0])
    }
}

/// Read a whole file, mapping a missing file to [`ReaderError::MissingFile`].
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| ReaderError::read_failed(path, e))
}

/// Read `count` `i32` values from a single Fortran unformatted sequential
/// record (`u32` byte count, payload, `u32` byte count).
pub fn read_fortran_i32_record(path: &Path, order: ByteOrder, count: usize) -> Result<Vec<i32>> {
    let buf = read_file(path)?;
    let mut reader = RecordReader::new(path, &buf, order);

    let head = reader.i32()?;
    if head as usize != count * 4 {
        return Err(ReaderError::malformed(
            path,
            format!("record marker {} does not match {} values", head, count),
        ));
    }
    let values = reader.i32s(count)?;
    let tail = reader.i32()?;
    if tail != head {
        return Err(ReaderError::malformed(
            path,
            format!("record markers differ: head {} tail {}", head, tail),
        ));
    }
    Ok(values)
}

/// Flat index of `(i, j, k, m)` in a Fortran-ordered `(ni, nj, nk, nm)` block.
#[inline]
pub fn fortran_index(i: usize, j: usize, k: usize, m: usize, dims: (usize, usize, usize)) -> usize {
    let (ni, nj, nk) = dims;
    i + ni * (j + nj * (k + nk * m))
}

/// Write `values`, given in Fortran order, into `dst` in place.
///
/// Reversing the axes of a view turns row-major iteration into column-major
/// iteration, so no intermediate array is needed. Returns the number of
/// elements written.
pub fn fill_fortran_order<A, D, I>(dst: ArrayViewMut<'_, A, D>, values: I) -> usize
where
    D: Dimension,
    I: IntoIterator<Item = A>,
{
    let mut written = 0;
    for (slot, value) in dst.reversed_axes().iter_mut().zip(values) {
        *slot = value;
        written += 1;
    }
    written
}

/// Zero-padded step/rank suffix used throughout the directory layout.
pub fn step_label(n: u32) -> String {
    format!("{:08}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_flag() {
        assert_eq!(ByteOrder::from_swap_flag(0), ByteOrder::Little);
        assert_eq!(ByteOrder::from_swap_flag(1), ByteOrder::Big);
        assert_eq!(ByteOrder::Big.swap_flag(), 1);
    }

    #[test]
    fn test_decode_big_endian() {
        let mut buf = Vec::new();
        ByteOrder::Big.encode_f32(&mut buf, [1.5f32, -2.0]);
        assert_eq!(&buf[..4], &1.5f32.to_be_bytes());
        assert_eq!(ByteOrder::Big.decode_f32(&buf, 2), vec![1.5, -2.0]);
    }

    #[test]
    fn test_record_reader_truncation() {
        let buf = vec![0u8; 10];
        let path = Path::new("rec.dac");
        let mut reader = RecordReader::new(path, &buf, ByteOrder::Little);
        assert!(reader.f64s(1).is_ok());
        match reader.f64s(1) {
            Err(ReaderError::Truncated { expected, found, .. }) => {
                assert_eq!(expected, 16);
                assert_eq!(found, 10);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_fortran_index() {
        // (2, 3, 4, 2) block: i fastest, m slowest
        assert_eq!(fortran_index(0, 0, 0, 0, (2, 3, 4)), 0);
        assert_eq!(fortran_index(1, 0, 0, 0, (2, 3, 4)), 1);
        assert_eq!(fortran_index(0, 1, 0, 0, (2, 3, 4)), 2);
        assert_eq!(fortran_index(0, 0, 1, 0, (2, 3, 4)), 6);
        assert_eq!(fortran_index(0, 0, 0, 1, (2, 3, 4)), 24);
    }

    #[test]
    fn test_fill_fortran_order() {
        let mut dst = ndarray::Array3::<f32>::zeros((2, 3, 2));
        let written = fill_fortran_order(dst.view_mut(), (0..12).map(|v| v as f32));
        assert_eq!(written, 12);
        for ((i, j, k), v) in dst.indexed_iter() {
            assert_eq!(*v as usize, fortran_index(i, j, k, 0, (2, 3, 2)));
        }
    }

    #[test]
    fn test_value_iterators() {
        let mut buf = Vec::new();
        ByteOrder::Little.encode_f64(&mut buf, [1.0, 2.5]);
        buf.push(0xff);
        let values: Vec<f64> = ByteOrder::Little.f64_values(&buf).collect();
        assert_eq!(values, vec![1.0, 2.5]);
    }

    #[test]
    fn test_step_label() {
        assert_eq!(step_label(5), "00000005");
    }
}
