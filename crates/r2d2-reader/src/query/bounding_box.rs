use std::sync::Arc;

use ndarray::{Array3, Ix3};
use serde::{Deserialize, Serialize};

use super::{read_into_buffers, volume_view};
use crate::cache::{BufferStats, FieldBuffers};
use crate::catalogue::Variables;
use crate::engine::{IndexBox, ReconstructionStats, Region};
use crate::error::Result;
use crate::grid::nearest_index;
use crate::metadata::RunMetadata;

/// Physical extent of a box, one `(min, max)` pair per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalBounds {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub z: (f64, f64),
}

impl PhysicalBounds {
    pub fn new(x: (f64, f64), y: (f64, f64), z: (f64, f64)) -> Self {
        Self { x, y, z }
    }
}

/// Inclusive nearest-index range of `bounds` on `coords`, in ascending order.
fn index_range(coords: &[f64], bounds: (f64, f64)) -> std::ops::Range<usize> {
    let a = nearest_index(coords, bounds.0);
    let b = nearest_index(coords, bounds.1);
    a.min(b)..a.max(b) + 1
}

/// Selected variables inside a box of the global grid.
#[derive(Debug)]
pub struct BoundingBox {
    metadata: Arc<RunMetadata>,
    buffers: FieldBuffers<f32, Ix3>,
    region: Option<IndexBox>,
}

impl BoundingBox {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        let reuse = metadata.config().reuse_buffers;
        Self {
            metadata,
            buffers: FieldBuffers::new(reuse),
            region: None,
        }
    }

    /// Read the box spanned by the grid points nearest `bounds`, ends
    /// included.
    pub fn read(
        &mut self,
        step: u32,
        variables: impl Into<Variables>,
        bounds: PhysicalBounds,
    ) -> Result<ReconstructionStats> {
        let grid = self.metadata.grid();
        let bx = IndexBox::new(
            index_range(&grid.x, bounds.x),
            index_range(&grid.y, bounds.y),
            index_range(&grid.z, bounds.z),
        );
        self.read_indices(step, variables, bx)
    }

    /// Read an explicit half-open index box.
    pub fn read_indices(
        &mut self,
        step: u32,
        variables: impl Into<Variables>,
        bx: IndexBox,
    ) -> Result<ReconstructionStats> {
        let variables = variables.into();
        let bx = Region::Box(bx).resolve(&self.metadata)?;
        let (ni, nj, nk) = bx.shape();
        let stats = read_into_buffers(
            &self.metadata,
            &mut self.buffers,
            Ix3(ni, nj, nk),
            &bx,
            step,
            &variables,
            volume_view,
        )?;
        self.region = Some(bx);
        Ok(stats)
    }

    pub fn get(&self, name: &str) -> Option<&Array3<f32>> {
        self.buffers.get(name)
    }

    /// Index box of the last read.
    pub fn region(&self) -> Option<&IndexBox> {
        self.region.as_ref()
    }

    /// Cell-center coordinates of the last read's box, per axis.
    pub fn coordinates(&self) -> Option<(&[f64], &[f64], &[f64])> {
        let bx = self.region.as_ref()?;
        let grid = self.metadata.grid();
        Some((
            &grid.x[bx.i.clone()],
            &grid.y[bx.j.clone()],
            &grid.z[bx.k.clone()],
        ))
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffers.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_range_normalises_order() {
        let coords = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(index_range(&coords, (1.1, 2.9)), 1..4);
        assert_eq!(index_range(&coords, (2.9, 1.1)), 1..4);
        assert_eq!(index_range(&coords, (2.0, 2.0)), 2..3);
        assert_eq!(index_range(&coords, (-9.0, 9.0)), 0..5);
    }
}
