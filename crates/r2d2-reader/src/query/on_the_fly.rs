use std::path::PathBuf;
use std::sync::Arc;

use ndarray::{Array2, Ix2};
use serde::Serialize;

use crate::cache::{BufferStats, FieldBuffers};
use crate::error::{ReaderError, Result};
use crate::layout::{fill_fortran_order, read_file, step_label};
use crate::metadata::RunMetadata;

/// Group of on-the-fly diagnostics sharing one file and one plane shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OnTheFlyGroup {
    /// `(ix, jx)`, averaged over the third axis.
    Xy,
    /// `(ix, kx)`, averaged over the second axis.
    Xz,
    /// `(ix + 1, jx)` on first-axis cell faces.
    Flux,
    /// `(ix, kx / 4)` spectra, Yin-Yang runs only.
    Spex,
}

impl OnTheFlyGroup {
    pub const ALL: [OnTheFlyGroup; 4] = [Self::Xy, Self::Xz, Self::Flux, Self::Spex];

    fn file_stem(&self) -> &'static str {
        match self {
            Self::Xy => "vl_xy",
            Self::Xz => "vl_xz",
            Self::Flux => "vl_flux",
            Self::Spex => "vl_spex",
        }
    }

    fn slot(&self) -> usize {
        match self {
            Self::Xy => 0,
            Self::Xz => 1,
            Self::Flux => 2,
            Self::Spex => 3,
        }
    }
}

/// 2D diagnostics accumulated during the run (`remap/vl/`).
#[derive(Debug)]
pub struct OnTheFlyProfiles {
    metadata: Arc<RunMetadata>,
    groups: [FieldBuffers<f32, Ix2>; 4],
    step: Option<u32>,
}

impl OnTheFlyProfiles {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        let reuse = metadata.config().reuse_buffers;
        Self {
            metadata,
            groups: std::array::from_fn(|_| FieldBuffers::new(reuse)),
            step: None,
        }
    }

    pub fn path(&self, group: OnTheFlyGroup, step: u32) -> PathBuf {
        self.metadata
            .datadir()
            .join("remap")
            .join("vl")
            .join(format!("{}.dac.{}", group.file_stem(), step_label(step)))
    }

    /// Plane shape and quantity count of `group`, `None` when the run does
    /// not write it.
    fn layout(&self, group: OnTheFlyGroup) -> Result<Option<((usize, usize), usize)>> {
        let catalogue = self.metadata.on_the_fly()?;
        let grid = self.metadata.grid();
        Ok(match group {
            OnTheFlyGroup::Xy => Some(((grid.ix, grid.jx), catalogue.m2d_xy)),
            OnTheFlyGroup::Xz => Some(((grid.ix, grid.kx), catalogue.m2d_xz)),
            OnTheFlyGroup::Flux => Some(((grid.ix + 1, grid.jx), catalogue.m2d_flux)),
            OnTheFlyGroup::Spex => catalogue.m2d_spex.map(|m| ((grid.ix, grid.kx / 4), m)),
        })
    }

    pub fn read(&mut self, step: u32) -> Result<()> {
        let names = self.metadata.on_the_fly()?.names.clone();
        let order = self.metadata.byte_order();

        let mut offset = 0;
        for group in OnTheFlyGroup::ALL {
            let Some(((n1, n2), count)) = self.layout(group)? else {
                continue;
            };
            let group_names = &names[offset..offset + count];
            offset += count;
            if count == 0 {
                continue;
            }

            let path = self.path(group, step);
            let buf = read_file(&path)?;
            let plane = n1 * n2;
            if buf.len() < plane * count * 4 {
                return Err(ReaderError::Truncated {
                    path,
                    expected: plane * count * 4,
                    found: buf.len(),
                });
            }

            let buffers = &mut self.groups[group.slot()];
            buffers.prepare(Ix2(n1, n2), group_names.iter().map(|n| n.as_str()));
            for (m, name) in group_names.iter().enumerate() {
                if let Some(array) = buffers.get_mut(name) {
                    let bytes = &buf[m * plane * 4..(m + 1) * plane * 4];
                    fill_fortran_order(array.view_mut(), order.f32_values(bytes));
                }
            }
        }

        tracing::debug!(step, quantities = names.len(), "Read on-the-fly diagnostics");
        self.step = Some(step);
        Ok(())
    }

    /// Quantity by catalogue name, searched across all groups.
    pub fn get(&self, name: &str) -> Option<&Array2<f32>> {
        self.groups.iter().find_map(|g| g.get(name))
    }

    /// Quantities of one group.
    pub fn group(&self, group: OnTheFlyGroup) -> impl Iterator<Item = (&str, &Array2<f32>)> {
        self.groups[group.slot()].iter()
    }

    pub fn step(&self) -> Option<u32> {
        self.step
    }

    pub fn buffer_stats(&self, group: OnTheFlyGroup) -> BufferStats {
        self.groups[group.slot()].stats()
    }
}
