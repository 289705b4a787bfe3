use std::sync::Arc;

use ndarray::{Array2, Ix2};
use serde::Serialize;

use crate::cache::{BufferStats, FieldBuffers};
use crate::catalogue::DERIVED_VARIABLES;
use crate::error::{ReaderError, Result};
use crate::grid::Geometry;
use crate::layout::{fill_fortran_order, read_file, step_label};
use crate::metadata::{RunMetadata, SliceAxis};

/// One patch of a Yin-Yang grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Patch {
    Yin,
    Yang,
}

impl Patch {
    pub const BOTH: [Patch; 2] = [Patch::Yin, Patch::Yang];

    /// Suffix used in file names.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Yin => "_yin",
            Self::Yang => "_yan",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Yin => "yin",
            Self::Yang => "yang",
        }
    }
}

/// Patches present in a run: both for Yin-Yang, a single unnamed one otherwise.
pub(crate) fn run_patches(metadata: &RunMetadata) -> Vec<Option<Patch>> {
    if metadata.grid().geometry == Geometry::YinYang {
        Patch::BOTH.iter().copied().map(Some).collect()
    } else {
        vec![None]
    }
}

fn buffer_key(name: &str, patch: Option<Patch>) -> String {
    match patch {
        Some(p) => format!("{}{}", name, p.file_suffix()),
        None => name.to_string(),
    }
}

/// Planes written at fixed positions during the run (`slice/`).
///
/// Each plane holds the primary variables followed by `pr` and `te`.
#[derive(Debug)]
pub struct ArbitrarySlice {
    metadata: Arc<RunMetadata>,
    buffers: FieldBuffers<f32, Ix2>,
    selected: Option<(SliceAxis, usize, f64)>,
}

impl ArbitrarySlice {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        let reuse = metadata.config().reuse_buffers;
        Self {
            metadata,
            buffers: FieldBuffers::new(reuse),
            selected: None,
        }
    }

    /// Plane shape normal to `axis`.
    fn plane_shape(&self, axis: SliceAxis) -> (usize, usize) {
        let grid = self.metadata.grid();
        match (axis, &grid.yin_yang) {
            (SliceAxis::X, Some(patch)) => (patch.jx + 2 * grid.margin, patch.kx + 2 * grid.margin),
            (SliceAxis::X, None) => (grid.jx, grid.kx),
            (SliceAxis::Y, _) => (grid.ix, grid.kx),
            (SliceAxis::Z, _) => (grid.ix, grid.jx),
        }
    }

    /// Variable names stored in every slice file.
    pub fn variable_names(&self) -> Vec<&'static str> {
        let catalogue = self.metadata.catalogue();
        catalogue
            .primary_names()
            .iter()
            .copied()
            .chain(DERIVED_VARIABLES.iter().copied().take(2))
            .collect()
    }

    pub fn path(&self, index: usize, axis: SliceAxis, step: u32, patch: Option<Patch>) -> std::path::PathBuf {
        self.metadata.datadir().join("slice").join(format!(
            "qq{}{}.dac.{}.{:08}",
            axis.letter(),
            patch.map(|p| p.file_suffix()).unwrap_or(""),
            step_label(step),
            index + 1
        ))
    }

    /// Read slice number `index` (0-based) normal to `axis` at `step`.
    pub fn read(&mut self, index: usize, axis: SliceAxis, step: u32) -> Result<()> {
        let positions = self.metadata.slices()?.positions(axis);
        let position = *positions.get(index).ok_or_else(|| {
            ReaderError::invalid_region(format!(
                "slice {} normal to {} out of {} planes",
                index,
                axis.letter(),
                positions.len()
            ))
        })?;

        let (n1, n2) = self.plane_shape(axis);
        let mtype = self.metadata.catalogue().mtype();
        let slots = mtype + 2;
        let plane = n1 * n2;
        let names = self.variable_names();
        let patches = run_patches(&self.metadata);
        let order = self.metadata.byte_order();

        let mut files = Vec::with_capacity(patches.len());
        for &patch in &patches {
            let path = self.path(index, axis, step, patch);
            let buf = read_file(&path)?;
            if buf.len() < plane * slots * 4 {
                return Err(ReaderError::Truncated {
                    path,
                    expected: plane * slots * 4,
                    found: buf.len(),
                });
            }
            files.push((patch, buf));
        }

        let keys: Vec<String> = patches
            .iter()
            .flat_map(|&p| names.iter().map(move |n| buffer_key(n, p)))
            .collect();
        self.buffers.prepare(Ix2(n1, n2), keys.iter().map(|k| k.as_str()));

        for (patch, buf) in &files {
            for (slot, name) in (0..mtype).chain([mtype, mtype + 1]).zip(&names) {
                let key = buffer_key(name, *patch);
                let Some(array) = self.buffers.get_mut(&key) else {
                    continue;
                };
                let bytes = &buf[slot * plane * 4..(slot + 1) * plane * 4];
                fill_fortran_order(array.view_mut(), order.f32_values(bytes));
            }
        }

        tracing::debug!(
            axis = %axis.letter(),
            index,
            position,
            step,
            "Read arbitrary slice"
        );
        self.selected = Some((axis, index, position));
        Ok(())
    }

    /// Plane of `name` (single-patch runs).
    pub fn get(&self, name: &str) -> Option<&Array2<f32>> {
        self.buffers.get(name)
    }

    /// Plane of `name` on one patch of a Yin-Yang run.
    pub fn get_patch(&self, name: &str, patch: Patch) -> Option<&Array2<f32>> {
        self.buffers.get(&buffer_key(name, Some(patch)))
    }

    /// Axis, index and position of the plane last read.
    pub fn selected(&self) -> Option<(SliceAxis, usize, f64)> {
        self.selected
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffers.stats()
    }
}
