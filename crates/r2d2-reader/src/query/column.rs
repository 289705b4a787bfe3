use std::ops::Range;
use std::sync::Arc;

use ndarray::{Array3, Ix3};

use super::{read_into_buffers, volume_view};
use crate::cache::{BufferStats, FieldBuffers};
use crate::catalogue::Variables;
use crate::engine::{ReconstructionStats, Region};
use crate::error::Result;
use crate::metadata::RunMetadata;

/// All variables over the first-axis range owned by one worker-grid row,
/// shaped `(rows in range, jx, kx)`.
#[derive(Debug)]
pub struct SingleColumnRegion {
    metadata: Arc<RunMetadata>,
    buffers: FieldBuffers<f32, Ix3>,
    range: Option<Range<usize>>,
}

impl SingleColumnRegion {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        let reuse = metadata.config().reuse_buffers;
        Self {
            metadata,
            buffers: FieldBuffers::new(reuse),
            range: None,
        }
    }

    pub fn read(&mut self, row: usize, step: u32) -> Result<ReconstructionStats> {
        let bx = Region::Column { row }.resolve(&self.metadata)?;
        let (ni, jx, kx) = bx.shape();
        let stats = read_into_buffers(
            &self.metadata,
            &mut self.buffers,
            Ix3(ni, jx, kx),
            &bx,
            step,
            &Variables::All,
            volume_view,
        )?;
        self.range = Some(bx.i);
        Ok(stats)
    }

    pub fn get(&self, name: &str) -> Option<&Array3<f32>> {
        self.buffers.get(name)
    }

    /// Global first-axis range of the last read.
    pub fn range(&self) -> Option<&Range<usize>> {
        self.range.as_ref()
    }

    /// First-axis coordinates of the last read.
    pub fn x(&self) -> Option<&[f64]> {
        let range = self.range.clone()?;
        Some(&self.metadata.grid().x[range])
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffers.stats()
    }
}
