use std::sync::Arc;

use ndarray::{Array2, ArrayViewMut2, ArrayViewMut3, Axis, Ix2};

use super::read_into_buffers;
use crate::cache::{BufferStats, FieldBuffers};
use crate::catalogue::Variables;
use crate::engine::{ReconstructionStats, Region};
use crate::error::Result;
use crate::metadata::RunMetadata;

fn height_plane_view(view: ArrayViewMut2<'_, f32>) -> ArrayViewMut3<'_, f32> {
    view.insert_axis(Axis(0))
}

fn z_plane_view(view: ArrayViewMut2<'_, f32>) -> ArrayViewMut3<'_, f32> {
    view.insert_axis(Axis(2))
}

/// All variables on the first-axis plane nearest a requested height,
/// shaped `(jx, kx)`.
#[derive(Debug)]
pub struct HeightPlane {
    metadata: Arc<RunMetadata>,
    buffers: FieldBuffers<f32, Ix2>,
    selected: Option<(usize, f64)>,
}

impl HeightPlane {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        let reuse = metadata.config().reuse_buffers;
        Self {
            metadata,
            buffers: FieldBuffers::new(reuse),
            selected: None,
        }
    }

    pub fn read(&mut self, x: f64, step: u32) -> Result<ReconstructionStats> {
        let i = self.metadata.grid().nearest_x(x);
        let bx = Region::HeightPlane { i }.resolve(&self.metadata)?;
        let selected = (i, self.metadata.grid().x[i]);
        let (_, jx, kx) = bx.shape();
        let stats = read_into_buffers(
            &self.metadata,
            &mut self.buffers,
            Ix2(jx, kx),
            &bx,
            step,
            &Variables::All,
            height_plane_view,
        )?;

        tracing::debug!(requested = x, index = i, selected = selected.1, "Read height plane");
        self.selected = Some(selected);
        Ok(stats)
    }

    pub fn get(&self, name: &str) -> Option<&Array2<f32>> {
        self.buffers.get(name)
    }

    /// Index and coordinate of the plane last read.
    pub fn selected(&self) -> Option<(usize, f64)> {
        self.selected
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffers.stats()
    }
}

/// All variables on the third-axis plane nearest a requested position,
/// shaped `(ix, jx)`.
#[derive(Debug)]
pub struct ZPlane {
    metadata: Arc<RunMetadata>,
    buffers: FieldBuffers<f32, Ix2>,
    selected: Option<(usize, f64)>,
}

impl ZPlane {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        let reuse = metadata.config().reuse_buffers;
        Self {
            metadata,
            buffers: FieldBuffers::new(reuse),
            selected: None,
        }
    }

    pub fn read(&mut self, z: f64, step: u32) -> Result<ReconstructionStats> {
        let k = self.metadata.grid().nearest_z(z);
        let bx = Region::ZPlane { k }.resolve(&self.metadata)?;
        let selected = (k, self.metadata.grid().z[k]);
        let (ix, jx, _) = bx.shape();
        let stats = read_into_buffers(
            &self.metadata,
            &mut self.buffers,
            Ix2(ix, jx),
            &bx,
            step,
            &Variables::All,
            z_plane_view,
        )?;

        tracing::debug!(requested = z, index = k, selected = selected.1, "Read z plane");
        self.selected = Some(selected);
        Ok(stats)
    }

    pub fn get(&self, name: &str) -> Option<&Array2<f32>> {
        self.buffers.get(name)
    }

    pub fn selected(&self) -> Option<(usize, f64)> {
        self.selected
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffers.stats()
    }
}
