//! Reconstruction of global arrays from per-worker fragments.
//!
//! A read names an index box of the global grid and a set of fields. The
//! engine visits the active workers in worker-grid order, skips every worker
//! whose extent misses the box before touching its file, and copies the
//! overlapping part of each field into caller-provided views.

use std::ops::Range;

use ndarray::{s, Array3, ArrayViewMut3};
use serde::Serialize;

use crate::catalogue::Field;
use crate::decomposition::DecompositionIndex;
use crate::error::{ReaderError, Result};
use crate::fragment::{Fragment, FragmentResolver};
use crate::metadata::RunMetadata;

/// Half-open index box of the global grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexBox {
    pub i: Range<usize>,
    pub j: Range<usize>,
    pub k: Range<usize>,
}

impl IndexBox {
    pub fn new(i: Range<usize>, j: Range<usize>, k: Range<usize>) -> Self {
        Self { i, j, k }
    }

    /// Box covering the whole `ix x jx x kx` grid.
    pub fn full(ix: usize, jx: usize, kx: usize) -> Self {
        Self::new(0..ix, 0..jx, 0..kx)
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.i.len(), self.j.len(), self.k.len())
    }

    pub fn is_empty(&self) -> bool {
        self.i.is_empty() || self.j.is_empty() || self.k.is_empty()
    }

    /// Whether the box lies inside an `ix x jx x kx` grid.
    pub fn fits(&self, ix: usize, jx: usize, kx: usize) -> bool {
        self.i.end <= ix && self.j.end <= jx && self.k.end <= kx
    }
}

/// Region of the global grid a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region {
    Full,
    /// One first-axis index, all of the second and third axes.
    HeightPlane { i: usize },
    /// One third-axis index, all of the first and second axes.
    ZPlane { k: usize },
    Box(IndexBox),
    /// All first-axis indices owned by one worker-grid row.
    Column { row: usize },
}

impl Region {
    /// Index box of this region, checked against the grid.
    pub fn resolve(&self, metadata: &RunMetadata) -> Result<IndexBox> {
        let grid = metadata.grid();
        let (ix, jx, kx) = (grid.ix, grid.jx, grid.kx);
        let bx = match self {
            Self::Full => IndexBox::full(ix, jx, kx),
            Self::HeightPlane { i } => IndexBox::new(*i..*i + 1, 0..jx, 0..kx),
            Self::ZPlane { k } => IndexBox::new(0..ix, 0..jx, *k..*k + 1),
            Self::Box(bx) => bx.clone(),
            Self::Column { row } => {
                let decomposition = metadata.decomposition()?;
                let (rows, _) = decomposition.grid_shape();
                if *row >= rows {
                    return Err(ReaderError::invalid_region(format!(
                        "row {} outside the {} worker-grid rows",
                        row, rows
                    )));
                }
                IndexBox::new(decomposition.row_range(*row)?, 0..jx, 0..kx)
            }
        };

        if bx.is_empty() {
            return Err(ReaderError::invalid_region(format!("{:?} is empty", bx)));
        }
        if !bx.fits(ix, jx, kx) {
            return Err(ReaderError::invalid_region(format!(
                "{:?} exceeds the {}x{}x{} grid",
                bx, ix, jx, kx
            )));
        }
        Ok(bx)
    }
}

/// Destination of one field during a read.
pub struct FieldTarget<'a> {
    pub field: Field,
    pub view: ArrayViewMut3<'a, f32>,
}

impl<'a> FieldTarget<'a> {
    pub fn new(field: Field, view: ArrayViewMut3<'a, f32>) -> Self {
        Self { field, view }
    }
}

/// Counters of one reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructionStats {
    /// Fragments opened and decoded.
    pub fragments_read: usize,
    /// Active workers skipped because they miss the box.
    pub workers_skipped: usize,
}

/// Reassembles global arrays from the fragments of one run.
pub struct ReconstructionEngine<'m> {
    metadata: &'m RunMetadata,
    decomposition: &'m DecompositionIndex,
    resolver: FragmentResolver,
}

impl<'m> ReconstructionEngine<'m> {
    pub fn new(metadata: &'m RunMetadata) -> Result<Self> {
        Ok(Self {
            metadata,
            decomposition: metadata.decomposition()?,
            resolver: FragmentResolver::new(metadata.datadir()),
        })
    }

    pub fn resolver(&self) -> &FragmentResolver {
        &self.resolver
    }

    /// Read `fields` over `region` of `step` into newly allocated arrays.
    pub fn reconstruct(&self, region: &Region, step: u32, fields: &[Field]) -> Result<Vec<Array3<f32>>> {
        let bx = region.resolve(self.metadata)?;
        let mut arrays: Vec<Array3<f32>> = fields.iter().map(|_| Array3::zeros(bx.shape())).collect();
        let mut targets: Vec<FieldTarget<'_>> = fields
            .iter()
            .zip(arrays.iter_mut())
            .map(|(field, array)| FieldTarget::new(*field, array.view_mut()))
            .collect();
        self.reconstruct_into(&bx, step, &mut targets)?;
        drop(targets);
        Ok(arrays)
    }

    /// Fill `targets` with the part of `step` inside `bx`.
    ///
    /// Every target view must have the shape of `bx`. Each global cell in the
    /// box is written by exactly one worker.
    pub fn reconstruct_into(
        &self,
        bx: &IndexBox,
        step: u32,
        targets: &mut [FieldTarget<'_>],
    ) -> Result<ReconstructionStats> {
        let shape = bx.shape();
        if let Some(t) = targets.iter().find(|t| t.view.dim() != shape) {
            return Err(ReaderError::invalid_region(format!(
                "target of shape {:?} does not match box shape {:?}",
                t.view.dim(),
                shape
            )));
        }

        let kx = self.metadata.grid().kx;
        let mtype = self.metadata.catalogue().mtype();
        let order = self.metadata.byte_order();
        let mut stats = ReconstructionStats::default();

        for worker in self.decomposition.active_workers() {
            let Some((oi, oj)) = worker.overlap(&bx.i, &bx.j) else {
                stats.workers_skipped += 1;
                continue;
            };

            let path = self.resolver.path(step, worker.rank);
            let fragment = Fragment::read(&path, order, worker, kx, mtype)?;
            stats.fragments_read += 1;

            // local (fragment) and destination (box) coordinates of the overlap
            let (li, lj) = (
                oi.start - worker.i.start..oi.end - worker.i.start,
                oj.start - worker.j.start..oj.end - worker.j.start,
            );
            let (di, dj) = (
                oi.start - bx.i.start..oi.end - bx.i.start,
                oj.start - bx.j.start..oj.end - bx.j.start,
            );

            for target in targets.iter_mut() {
                let source = fragment.field(target.field).ok_or_else(|| {
                    ReaderError::malformed(&path, format!("{:?} is not stored", target.field))
                })?;
                target
                    .view
                    .slice_mut(s![di.clone(), dj.clone(), ..])
                    .assign(&source.slice(s![li.clone(), lj.clone(), bx.k.clone()]));
            }
            tracing::debug!(
                worker = worker.rank,
                step,
                overlap_i = ?oi,
                overlap_j = ?oj,
                "Copied fragment overlap"
            );
        }

        tracing::debug!(
            step,
            box_shape = ?shape,
            fields = targets.len(),
            fragments_read = stats.fragments_read,
            workers_skipped = stats.workers_skipped,
            "Reconstructed region"
        );

        Ok(stats)
    }
}
