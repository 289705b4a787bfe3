//! Regridding of a checkpoint onto a new grid.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array3, Axis};
use r2d2_reader::{CheckpointSelector, CheckpointSnapshot, Geometry, ReaderError, RunMetadata};
use serde::Serialize;

use crate::config::RegridRequest;
use crate::coords::{top_concentrated, uniform};
use crate::error::{RegridError, Result};
use crate::interpolation::{Axes, Interpolator3d, TrilinearInterpolator};
use crate::provenance::ProvenanceLog;
use crate::writer::{copy_run_skeleton, ColdStartWriter};

/// Outcome of a regrid.
#[derive(Debug, Clone, Serialize)]
pub struct RegridReport {
    /// Data directory of the new run.
    pub datadir: PathBuf,
    /// Ghost-inclusive shape of every written field.
    pub shape: (usize, usize, usize),
    pub variables: usize,
    /// Checkpoint files written under `qq/`.
    pub files: Vec<PathBuf>,
    /// Files copied from the source run directory.
    pub skeleton_files: usize,
}

/// Ghost-inclusive target coordinates of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGrid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl TargetGrid {
    pub fn axes(&self) -> Axes<'_> {
        Axes::new(&self.x, &self.y, &self.z)
    }
}

/// Regrids checkpoints of one source run.
pub struct Regridder<I = TrilinearInterpolator> {
    metadata: Arc<RunMetadata>,
    interpolator: I,
}

impl Regridder<TrilinearInterpolator> {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        Self::with_interpolator(metadata, TrilinearInterpolator::new())
    }
}

impl<I: Interpolator3d> Regridder<I> {
    pub fn with_interpolator(metadata: Arc<RunMetadata>, interpolator: I) -> Self {
        Self {
            metadata,
            interpolator,
        }
    }

    pub fn metadata(&self) -> &Arc<RunMetadata> {
        &self.metadata
    }

    /// Target coordinates, with the source run's ghost width per axis.
    pub fn target_grid(&self, request: &RegridRequest) -> Result<TargetGrid> {
        let ghost = self.metadata.grid().ghost;
        let (rx, ry, rz) = (&request.x, &request.y, &request.z);
        let x = match &request.stretch {
            Some(s) => top_concentrated(rx.min, rx.max, rx.cells, ghost[0], s.fine_cells, s.fine_spacing)?,
            None => uniform(rx.min, rx.max, rx.cells, ghost[0]),
        };
        Ok(TargetGrid {
            x,
            y: uniform(ry.min, ry.max, ry.cells, ghost[1]),
            z: uniform(rz.min, rz.max, rz.cells, ghost[2]),
        })
    }

    /// Reject destinations that exist or coincide with the source run, and
    /// when the run skeleton is copied, destinations inside the source run.
    pub fn check_destination(&self, request: &RegridRequest) -> Result<()> {
        let destination = request.destination.as_path();
        let datadir = self.metadata.datadir();
        let source_data = fs::canonicalize(datadir).map_err(|e| RegridError::io(datadir, e))?;
        let source_run = source_data.parent().unwrap_or(&source_data);

        let resolved = resolve(destination);
        if resolved == source_run || resolved == source_data {
            return Err(RegridError::SameDirectory(destination.to_path_buf()));
        }
        if destination.exists() {
            return Err(RegridError::DestinationExists(destination.to_path_buf()));
        }
        if request.copy_skeleton && resolved.starts_with(source_run) {
            return Err(RegridError::InsideSource(destination.to_path_buf()));
        }
        Ok(())
    }

    /// Read the requested checkpoint and write it, regridded, as the
    /// initial condition of a new run at `request.destination`.
    ///
    /// Nothing is written unless the request, destination, target grid and
    /// checkpoint have all been checked.
    pub fn run(&self, request: &RegridRequest) -> Result<RegridReport> {
        request.validate()?;
        let grid = self.metadata.grid();
        if grid.geometry == Geometry::YinYang {
            return Err(RegridError::UnsupportedGeometry(grid.geometry.to_string()));
        }
        let destination = request.destination.as_path();
        self.check_destination(request)?;
        let target = self.target_grid(request)?;

        let selector = request.selector();
        let mut snapshot = CheckpointSnapshot::new(self.metadata.clone());
        snapshot.read(selector)?;
        let state = snapshot
            .state()
            .ok_or(ReaderError::CapabilityUnavailable("checkpoint state"))?;

        let started = Instant::now();
        let mtype = self.metadata.catalogue().mtype();
        tracing::info!(
            source = %self.metadata.datadir().display(),
            destination = %destination.display(),
            from = ?(grid.ix, grid.jx, grid.kx),
            to = ?(request.x.cells, request.y.cells, request.z.cells),
            stretched = request.stretch.is_some(),
            variables = mtype,
            "Starting regrid"
        );

        fs::create_dir_all(destination).map_err(|e| RegridError::io(destination, e))?;
        let skeleton_files = if request.copy_skeleton {
            let source_run = self
                .metadata
                .datadir()
                .parent()
                .ok_or_else(|| RegridError::Skeleton("source data directory has no parent".to_string()))?;
            copy_run_skeleton(source_run, destination)?
        } else {
            0
        };

        let writer = ColdStartWriter::new(destination.join("data"), request.byte_order);
        writer.create_layout()?;

        let source = Axes::new(&grid.xg, &grid.yg, &grid.zg);
        let mut files = Vec::new();
        let mut fields: Vec<Array3<f64>> = Vec::with_capacity(if request.split_variables { 0 } else { mtype });
        for m in 0..mtype {
            let field = self
                .interpolator
                .interpolate(source, state.index_axis(Axis(3), m), target.axes())?;
            if request.split_variables {
                files.push(writer.write_variable(m, field.view())?);
            } else {
                fields.push(field);
            }
            tracing::debug!(variable = m, "Regridded variable");
        }
        if !request.split_variables {
            files.push(writer.write_state(fields.iter().map(|f| f.view()))?);
        }

        writer.write_initial_step()?;
        let step_label = match selector {
            CheckpointSelector::Step(n) => n.to_string(),
            CheckpointSelector::Final => self.metadata.steps().nd.to_string(),
        };
        let log = ProvenanceLog::new(&self.metadata, step_label, request);
        writer.write_provenance(&log.render())?;

        let shape = target.axes().shape();
        tracing::info!(
            datadir = %writer.datadir().display(),
            shape = ?shape,
            files = files.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Regrid complete"
        );

        Ok(RegridReport {
            datadir: writer.datadir().to_path_buf(),
            shape,
            variables: mtype,
            files,
            skeleton_files,
        })
    }
}

/// Absolute form of `path` with symlinks resolved in its existing part.
fn resolve(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return missing.iter().rev().fold(canonical, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(tmp.path()).unwrap();
        fs::create_dir_all(base.join("run/data")).unwrap();

        assert_eq!(resolve(&base.join("run/data")), base.join("run/data"));
        assert_eq!(resolve(&base.join("run/new/deeper")), base.join("run/new/deeper"));
        assert_eq!(resolve(&base.join("run/data/../new")), base.join("run/new"));
    }
}
