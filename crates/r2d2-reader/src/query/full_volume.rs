use std::sync::Arc;

use ndarray::{Array3, Ix3};

use super::{read_into_buffers, volume_view};
use crate::cache::{BufferStats, FieldBuffers};
use crate::catalogue::Variables;
use crate::engine::{ReconstructionStats, Region};
use crate::error::Result;
use crate::metadata::RunMetadata;

/// Whole `(ix, jx, kx)` volume of selected variables.
#[derive(Debug)]
pub struct FullVolume {
    metadata: Arc<RunMetadata>,
    buffers: FieldBuffers<f32, Ix3>,
    step: Option<u32>,
}

impl FullVolume {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        let reuse = metadata.config().reuse_buffers;
        Self {
            metadata,
            buffers: FieldBuffers::new(reuse),
            step: None,
        }
    }

    /// Read `variables` (`"all"`, one name or a list) at `step`.
    pub fn read(&mut self, step: u32, variables: impl Into<Variables>) -> Result<ReconstructionStats> {
        let variables = variables.into();
        let bx = Region::Full.resolve(&self.metadata)?;
        let (ix, jx, kx) = bx.shape();
        let stats = read_into_buffers(
            &self.metadata,
            &mut self.buffers,
            Ix3(ix, jx, kx),
            &bx,
            step,
            &variables,
            volume_view,
        )?;
        self.step = Some(step);
        Ok(stats)
    }

    pub fn get(&self, name: &str) -> Option<&Array3<f32>> {
        self.buffers.get(name)
    }

    /// Arrays of the last read, keyed by variable.
    pub fn buffers(&self) -> &FieldBuffers<f32, Ix3> {
        &self.buffers
    }

    /// Variables currently held.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.buffers.names()
    }

    /// Step of the last successful read.
    pub fn step(&self) -> Option<u32> {
        self.step
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffers.stats()
    }
}
