use std::path::PathBuf;
use std::sync::Arc;

use ndarray::{Array4, ArrayView3, Axis, Ix4};
use serde::{Deserialize, Serialize};

use crate::cache::{BufferStats, FieldBuffers};
use crate::catalogue::Field;
use crate::error::{ReaderError, Result};
use crate::layout::{fill_fortran_order, read_file, step_label};
use crate::metadata::RunMetadata;

const SNAPSHOT_KEY: &str = "qq";

/// Which restart snapshot to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSelector {
    /// Snapshot written at a given output step.
    Step(u32),
    /// Latest rolling snapshot (`e` or `o` by parity of the step counter).
    Final,
}

impl CheckpointSelector {
    /// File name suffix under `qq/`.
    pub fn suffix(&self, nd: u32) -> String {
        match self {
            Self::Step(n) => step_label(*n),
            Self::Final if nd % 2 == 0 => "e".to_string(),
            Self::Final => "o".to_string(),
        }
    }
}

/// Ghost-inclusive double-precision restart state, shaped
/// `(ixg, jxg, kxg, mtype)`.
#[derive(Debug)]
pub struct CheckpointSnapshot {
    metadata: Arc<RunMetadata>,
    buffers: FieldBuffers<f64, Ix4>,
    selector: Option<CheckpointSelector>,
}

impl CheckpointSnapshot {
    pub fn new(metadata: Arc<RunMetadata>) -> Self {
        let reuse = metadata.config().reuse_buffers;
        Self {
            metadata,
            buffers: FieldBuffers::new(reuse),
            selector: None,
        }
    }

    pub fn path(&self, selector: CheckpointSelector) -> PathBuf {
        let suffix = selector.suffix(self.metadata.steps().nd);
        self.metadata
            .datadir()
            .join("qq")
            .join(format!("qq.dac.{}", suffix))
    }

    pub fn read(&mut self, selector: CheckpointSelector) -> Result<()> {
        let grid = self.metadata.grid();
        let shape = (grid.ixg, grid.jxg, grid.kxg, self.metadata.catalogue().mtype());
        let count = shape.0 * shape.1 * shape.2 * shape.3;

        let path = self.path(selector);
        let buf = read_file(&path)?;
        if buf.len() < count * 8 {
            return Err(ReaderError::Truncated {
                path,
                expected: count * 8,
                found: buf.len(),
            });
        }

        self.buffers
            .prepare(Ix4(shape.0, shape.1, shape.2, shape.3), [SNAPSHOT_KEY]);
        if let Some(state) = self.buffers.get_mut(SNAPSHOT_KEY) {
            let order = self.metadata.byte_order();
            fill_fortran_order(state.view_mut(), order.f64_values(&buf[..count * 8]));
        }

        tracing::debug!(path = %path.display(), shape = ?shape, "Read checkpoint snapshot");
        self.selector = Some(selector);
        Ok(())
    }

    /// Whole snapshot, variables on the last axis.
    pub fn state(&self) -> Option<&Array4<f64>> {
        self.buffers.get(SNAPSHOT_KEY)
    }

    /// Ghost-inclusive field of a primary variable.
    pub fn field(&self, name: &str) -> Result<Option<ArrayView3<'_, f64>>> {
        let m = match self.metadata.catalogue().resolve(name)? {
            Field::Primary(m) => m,
            Field::Derived(_) => {
                let names = self.metadata.catalogue().primary_names();
                return Err(ReaderError::unknown_variable(name, names));
            }
        };
        Ok(self.state().map(|s| s.index_axis(Axis(3), m)))
    }

    pub fn selector(&self) -> Option<CheckpointSelector> {
        self.selector
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffers.stats()
    }
}
