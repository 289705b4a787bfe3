use std::path::PathBuf;
use std::sync::Arc;

use ndarray::{s, ArrayView2, Ix4};

use super::slice::{run_patches, Patch};
use crate::cache::{BufferStats, FieldBuffers};
use crate::error::{ReaderError, Result};
use crate::layout::{fill_fortran_order, read_file, step_label};
use crate::metadata::RunMetadata;

/// Quantities stored on each optical-depth surface, in storage order.
pub const TAU_QUANTITIES: [&str; 13] = [
    "rt", "ro", "se", "pr", "te", "vx", "vy", "vz", "bx", "by", "bz", "he", "fr",
];

/// Optical-depth level of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TauLevel {
    /// τ = 1
    One,
    /// τ = 0.1
    PointOne,
    /// τ = 0.01
    PointZeroOne,
}

impl TauLevel {
    pub const ALL: [TauLevel; 3] = [Self::One, Self::PointOne, Self::PointZeroOne];

    pub fn index(&self) -> usize {
        match self {
            Self::One => 0,
            Self::PointOne => 1,
            Self::PointZeroOne => 2,
        }
    }

    pub fn tau(&self) -> f64 {
        match self {
            Self::One => 1.0,
            Self::PointOne => 0.1,
            Self::PointZeroOne => 0.01,
        }
    }

    /// Suffix appended to quantity names for this level (`ro`, `ro01`, `ro001`).
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::One => "",
            Self::PointOne => "01",
            Self::PointZeroOne => "001",
        }
    }
}

fn patch_key(patch: Option<Patch>) -> &'static str {
    patch.map(|p| p.name()).unwrap_or("")
}

/// Horizontal surfaces at fixed optical depths (`tau/`).
///
/// Each file holds a `(m_tu, m_in, jx, kx)` block: levels, quantities and the
/// two horizontal axes.
#[derive(Debug)]
pub struct OpticalDepthSurfaces {
    metadata: Arc<RunMetadata>,
    buffers: FieldBuffers<f32, Ix4>,
    step: Option<u32>,
}

impl OpticalDepthSurfaces {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        let reuse = metadata.config().reuse_buffers;
        Self {
            metadata,
            buffers: FieldBuffers::new(reuse),
            step: None,
        }
    }

    pub fn path(&self, step: u32, patch: Option<Patch>) -> PathBuf {
        self.metadata.datadir().join("tau").join(format!(
            "qq{}.dac.{}",
            patch.map(|p| p.file_suffix()).unwrap_or(""),
            step_label(step)
        ))
    }

    pub fn read(&mut self, step: u32) -> Result<()> {
        let params = self.metadata.params();
        let (m_tu, m_in) = (params.count("m_tu")?, params.count("m_in")?);
        let grid = self.metadata.grid();
        let (jx, kx) = match &grid.yin_yang {
            Some(patch) => (patch.jx, patch.kx),
            None => (grid.jx, grid.kx),
        };
        let count = m_tu * m_in * jx * kx;
        let patches = run_patches(&self.metadata);
        let order = self.metadata.byte_order();

        let mut files = Vec::with_capacity(patches.len());
        for &patch in &patches {
            let path = self.path(step, patch);
            let buf = read_file(&path)?;
            if buf.len() < count * 4 {
                return Err(ReaderError::Truncated {
                    path,
                    expected: count * 4,
                    found: buf.len(),
                });
            }
            files.push((patch, buf));
        }

        self.buffers.prepare(
            Ix4(m_tu, m_in, jx, kx),
            patches.iter().map(|&p| patch_key(p)),
        );
        for (patch, buf) in &files {
            if let Some(block) = self.buffers.get_mut(patch_key(*patch)) {
                fill_fortran_order(block.view_mut(), order.f32_values(&buf[..count * 4]));
            }
        }

        tracing::debug!(step, m_tu, m_in, patches = files.len(), "Read optical-depth surfaces");
        self.step = Some(step);
        Ok(())
    }

    /// Surface of `quantity` at `level` (single-patch runs).
    ///
    /// `Ok(None)` when nothing has been read or the run stores fewer levels
    /// or quantities than requested.
    pub fn surface(&self, quantity: &str, level: TauLevel) -> Result<Option<ArrayView2<'_, f32>>> {
        self.surface_of(None, quantity, level)
    }

    /// Surface on one patch of a Yin-Yang run.
    pub fn patch_surface(
        &self,
        patch: Patch,
        quantity: &str,
        level: TauLevel,
    ) -> Result<Option<ArrayView2<'_, f32>>> {
        self.surface_of(Some(patch), quantity, level)
    }

    fn surface_of(
        &self,
        patch: Option<Patch>,
        quantity: &str,
        level: TauLevel,
    ) -> Result<Option<ArrayView2<'_, f32>>> {
        let q = TAU_QUANTITIES
            .iter()
            .position(|&n| n == quantity)
            .ok_or_else(|| ReaderError::unknown_variable(quantity, &TAU_QUANTITIES))?;
        let Some(block) = self.buffers.get(patch_key(patch)) else {
            return Ok(None);
        };
        let (m_tu, m_in, _, _) = block.dim();
        if level.index() >= m_tu || q >= m_in {
            return Ok(None);
        }
        Ok(Some(block.slice(s![level.index(), q, .., ..])))
    }

    /// Surface addressed by its legacy name, such as `ro01` for density at
    /// τ = 0.1.
    pub fn by_name(&self, name: &str) -> Result<Option<ArrayView2<'_, f32>>> {
        for level in [TauLevel::PointZeroOne, TauLevel::PointOne] {
            if let Some(quantity) = name.strip_suffix(level.suffix()) {
                if TAU_QUANTITIES.contains(&quantity) {
                    return self.surface(quantity, level);
                }
            }
        }
        self.surface(name, TauLevel::One)
    }

    pub fn step(&self) -> Option<u32> {
        self.step
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffers.stats()
    }
}
