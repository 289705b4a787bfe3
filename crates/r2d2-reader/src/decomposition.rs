//! Domain decomposition of the remapped 3D output.
//!
//! At output time each worker writes one fragment holding a contiguous
//! `(i, j)` column range and the full third axis. Workers are laid out on an
//! `ixr x jxr` grid of rows and columns; `remap/remap_info.dac` records each
//! worker's extent, its place on that grid and which row/column owns every
//! global index.
//!
//! All ranges here are 0-based and half-open.

use std::ops::Range;
use std::path::Path;

use serde::Serialize;

use crate::error::{ReaderError, Result};
use crate::layout::{read_file, ByteOrder, RecordReader};

/// Extent of one worker's fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerExtent {
    pub rank: usize,
    /// Global first-axis range covered.
    pub i: Range<usize>,
    /// Global second-axis range covered.
    pub j: Range<usize>,
    /// Local `(first, second)` extent of the stored fragment.
    pub local: (usize, usize),
    /// Position on the worker grid.
    pub row: usize,
    pub col: usize,
}

impl WorkerExtent {
    /// Workers that produced no fragment have a zero local extent.
    pub fn is_idle(&self) -> bool {
        self.local.0 == 0 || self.local.1 == 0
    }

    /// Overlap of this worker's extent with the requested ranges.
    pub fn overlap(&self, i: &Range<usize>, j: &Range<usize>) -> Option<(Range<usize>, Range<usize>)> {
        let oi = self.i.start.max(i.start)..self.i.end.min(i.end);
        let oj = self.j.start.max(j.start)..self.j.end.min(j.end);
        if oi.is_empty() || oj.is_empty() {
            None
        } else {
            Some((oi, oj))
        }
    }
}

/// Tables describing which worker holds which part of the global grid.
#[derive(Debug, Clone, Serialize)]
pub struct DecompositionIndex {
    workers: Vec<WorkerExtent>,
    rows: usize,
    cols: usize,
    /// Rank of the worker at each `(row, col)`, row-major.
    rank_table: Vec<usize>,
    /// Row owning each global first-axis index.
    i_to_row: Vec<usize>,
    /// Column owning each global second-axis index.
    j_to_col: Vec<usize>,
}

/// Shape information needed to parse `remap_info.dac`.
#[derive(Debug, Clone, Copy)]
pub struct DecompositionShape {
    pub npe: usize,
    pub rows: usize,
    pub cols: usize,
    pub ixg: usize,
    pub jxg: usize,
    /// Ghost width of the first and second axes.
    pub ghost: (usize, usize),
}

impl DecompositionIndex {
    /// Parse `remap_info.dac`.
    pub fn load(path: &Path, order: ByteOrder, shape: DecompositionShape) -> Result<Self> {
        let buf = read_file(path)?;
        let mut reader = RecordReader::new(path, &buf, order);
        let DecompositionShape {
            npe,
            rows,
            cols,
            ixg,
            jxg,
            ghost,
        } = shape;

        let iss = reader.i32s(npe)?;
        let iee = reader.i32s(npe)?;
        let jss = reader.i32s(npe)?;
        let jee = reader.i32s(npe)?;
        let iixl = reader.i32s(npe)?;
        let jjxl = reader.i32s(npe)?;
        let np_ijr = reader.i32s(rows * cols)?;
        let ir = reader.i32s(npe)?;
        let jr = reader.i32s(npe)?;
        let i2ir = reader.i32s(ixg)?;
        let j2jr = reader.i32s(jxg)?;

        let bad = |msg: String| ReaderError::malformed(path, msg);
        let to_usize = |v: i32, what: &str| -> Result<usize> {
            usize::try_from(v).map_err(|_| bad(format!("negative {}: {}", what, v)))
        };
        let one_based = |v: i32, what: &str| -> Result<usize> {
            if v < 1 {
                return Err(bad(format!("{} must be 1-based, got {}", what, v)));
            }
            Ok(v as usize - 1)
        };

        let mut workers = Vec::with_capacity(npe);
        for rank in 0..npe {
            let local = (to_usize(iixl[rank], "iixl")?, to_usize(jjxl[rank], "jjxl")?);
            let (i, j) = if local.0 == 0 || local.1 == 0 {
                (0..0, 0..0)
            } else {
                (
                    one_based(iss[rank], "iss")?..to_usize(iee[rank], "iee")?,
                    one_based(jss[rank], "jss")?..to_usize(jee[rank], "jee")?,
                )
            };
            workers.push(WorkerExtent {
                rank,
                i,
                j,
                local,
                row: one_based(ir[rank], "ir")?,
                col: one_based(jr[rank], "jr")?,
            });
        }

        // np_ijr is stored (rows, cols) in Fortran order
        let mut rank_table = vec![0; rows * cols];
        for col in 0..cols {
            for row in 0..rows {
                let rank = to_usize(np_ijr[row + rows * col], "np_ijr")?;
                if rank >= npe {
                    return Err(bad(format!(
                        "np_ijr({}, {}) = {} exceeds worker count {}",
                        row, col, rank, npe
                    )));
                }
                rank_table[row * cols + col] = rank;
            }
        }

        let (gx, gy) = ghost;
        let i_to_row = i2ir[gx..ixg - gx]
            .iter()
            .map(|&v| one_based(v, "i2ir"))
            .collect::<Result<Vec<_>>>()?;
        let j_to_col = j2jr[gy..jxg - gy]
            .iter()
            .map(|&v| one_based(v, "j2jr"))
            .collect::<Result<Vec<_>>>()?;

        let index = Self::from_parts(workers, rows, cols, rank_table, i_to_row, j_to_col)?;
        let misplaced = (0..rows * cols)
            .filter(|&cell| {
                let w = &index.workers[index.rank_table[cell]];
                (w.row, w.col) != (cell / cols, cell % cols)
            })
            .count();
        if misplaced > 0 {
            tracing::warn!(
                path = %path.display(),
                misplaced,
                "Worker grid lists ranks recorded at another position; they are skipped"
            );
        }
        Ok(index)
    }

    /// Assemble an index from already-converted tables.
    pub fn from_parts(
        workers: Vec<WorkerExtent>,
        rows: usize,
        cols: usize,
        rank_table: Vec<usize>,
        i_to_row: Vec<usize>,
        j_to_col: Vec<usize>,
    ) -> Result<Self> {
        if rank_table.len() != rows * cols {
            return Err(ReaderError::DecompositionMismatch(format!(
                "rank table has {} entries for a {}x{} worker grid",
                rank_table.len(),
                rows,
                cols
            )));
        }
        if let Some(w) = workers.iter().find(|w| w.row >= rows || w.col >= cols) {
            return Err(ReaderError::DecompositionMismatch(format!(
                "worker {} sits at ({}, {}) outside the {}x{} grid",
                w.rank, w.row, w.col, rows, cols
            )));
        }
        if let Some(&row) = i_to_row.iter().find(|&&r| r >= rows) {
            return Err(ReaderError::DecompositionMismatch(format!(
                "first-axis row {} outside {} rows",
                row, rows
            )));
        }
        if let Some(&col) = j_to_col.iter().find(|&&c| c >= cols) {
            return Err(ReaderError::DecompositionMismatch(format!(
                "second-axis column {} outside {} columns",
                col, cols
            )));
        }

        Ok(Self {
            workers,
            rows,
            cols,
            rank_table,
            i_to_row,
            j_to_col,
        })
    }

    pub fn workers(&self) -> &[WorkerExtent] {
        &self.workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Worker grid dimensions `(rows, cols)`.
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Worker recorded at `(row, col)` of the worker grid.
    pub fn worker_at(&self, row: usize, col: usize) -> Option<&WorkerExtent> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.workers.get(self.rank_table[row * self.cols + col])
    }

    /// Row owning global first-axis index `i`.
    pub fn row_of(&self, i: usize) -> Option<usize> {
        self.i_to_row.get(i).copied()
    }

    /// Column owning global second-axis index `j`.
    pub fn col_of(&self, j: usize) -> Option<usize> {
        self.j_to_col.get(j).copied()
    }

    /// Rank of the worker owning global `(i, j)`.
    pub fn owner_of(&self, i: usize, j: usize) -> Option<usize> {
        let row = self.row_of(i)?;
        let col = self.col_of(j)?;
        self.worker_at(row, col)
            .filter(|w| w.i.contains(&i) && w.j.contains(&j))
            .map(|w| w.rank)
    }

    /// Global first-axis indices owned by `row`.
    pub fn row_range(&self, row: usize) -> Result<Range<usize>> {
        let start = self
            .i_to_row
            .iter()
            .position(|&r| r == row)
            .ok_or_else(|| ReaderError::invalid_region(format!("row {} owns no cells", row)))?;
        let len = self.i_to_row[start..].iter().take_while(|&&r| r == row).count();
        let end = start + len;
        if self.i_to_row[end..].contains(&row) {
            return Err(ReaderError::DecompositionMismatch(format!(
                "row {} owns a non-contiguous first-axis range",
                row
            )));
        }
        Ok(start..end)
    }

    /// Active workers in fragment visitation order: worker-grid rows then
    /// columns, keeping only workers whose recorded position matches the
    /// grid cell they are listed under.
    pub fn active_workers(&self) -> impl Iterator<Item = &WorkerExtent> + '_ {
        (0..self.rows).flat_map(move |row| {
            (0..self.cols).filter_map(move |col| {
                self.worker_at(row, col)
                    .filter(|w| w.row == row && w.col == col && !w.is_idle())
            })
        })
    }

    /// Check that active workers cover the `ix x jx` plane exactly once.
    ///
    /// The second-axis ownership table is not compared against `jx`: Yin-Yang
    /// runs record it per patch while fragments cover the merged grid.
    pub fn validate_tiling(&self, ix: usize, jx: usize) -> Result<()> {
        if self.i_to_row.len() != ix {
            return Err(ReaderError::DecompositionMismatch(format!(
                "first-axis ownership table covers {} cells, grid has {}",
                self.i_to_row.len(),
                ix
            )));
        }

        let mut hits = vec![0u32; ix * jx];
        for w in self.active_workers() {
            if w.i.len() != w.local.0 || w.j.len() != w.local.1 {
                return Err(ReaderError::DecompositionMismatch(format!(
                    "worker {} covers {:?}x{:?} but stores {}x{}",
                    w.rank, w.i, w.j, w.local.0, w.local.1
                )));
            }
            if w.i.end > ix || w.j.end > jx {
                return Err(ReaderError::DecompositionMismatch(format!(
                    "worker {} extends past the {}x{} grid",
                    w.rank, ix, jx
                )));
            }
            for i in w.i.clone() {
                for j in w.j.clone() {
                    hits[i * jx + j] += 1;
                }
            }
        }

        if let Some(pos) = hits.iter().position(|&h| h != 1) {
            return Err(ReaderError::DecompositionMismatch(format!(
                "cell ({}, {}) is covered {} times",
                pos / jx,
                pos % jx,
                hits[pos]
            )));
        }
        Ok(())
    }
}
