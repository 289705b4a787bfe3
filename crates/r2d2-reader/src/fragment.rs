//! Location and decoding of per-worker fragments of the remapped 3D output.

use std::path::{Path, PathBuf};

use ndarray::{Array3, Array4, ArrayView3, Axis, ShapeBuilder};

use crate::catalogue::{Field, DERIVED_VARIABLES};
use crate::decomposition::{DecompositionIndex, WorkerExtent};
use crate::error::{ReaderError, Result};
use crate::layout::{read_file, step_label, ByteOrder, RecordReader};

/// Workers per bucket directory in the bucketed layout.
const BUCKET_SIZE: usize = 1000;

/// Directory scheme used for fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentLayout {
    /// `remap/qq/<bucket:05>/<rank:08>/qq.dac.<step:08>.<rank:08>`
    Bucketed,
    /// `remap/qq/qq.dac.<step:08>.<rank:08>`
    Flat,
}

/// Maps `(step, rank)` to a fragment path.
#[derive(Debug, Clone)]
pub struct FragmentResolver {
    root: PathBuf,
    layout: FragmentLayout,
}

impl FragmentResolver {
    /// Detect the layout under `<datadir>/remap/qq`. The bucketed layout is
    /// recognised by the presence of the first bucket directory.
    pub fn new(datadir: &Path) -> Self {
        let root = datadir.join("remap").join("qq");
        let layout = if root.join("00000").is_dir() {
            FragmentLayout::Bucketed
        } else {
            FragmentLayout::Flat
        };
        Self { root, layout }
    }

    pub fn with_layout(datadir: &Path, layout: FragmentLayout) -> Self {
        Self {
            root: datadir.join("remap").join("qq"),
            layout,
        }
    }

    pub fn layout(&self) -> FragmentLayout {
        self.layout
    }

    pub fn path(&self, step: u32, rank: usize) -> PathBuf {
        let name = format!("qq.dac.{}.{:08}", step_label(step), rank);
        match self.layout {
            FragmentLayout::Bucketed => self
                .root
                .join(format!("{:05}", rank / BUCKET_SIZE))
                .join(format!("{:08}", rank))
                .join(name),
            FragmentLayout::Flat => self.root.join(name),
        }
    }

    /// Paths of every fragment a full read of `step` would open, in
    /// visitation order.
    pub fn manifest(&self, step: u32, decomposition: &DecompositionIndex) -> Vec<PathBuf> {
        decomposition
            .active_workers()
            .map(|w| self.path(step, w.rank))
            .collect()
    }
}

/// One decoded fragment.
#[derive(Debug)]
pub struct Fragment {
    /// Primary block `(local_i, local_j, kx, mtype)`.
    primary: Array4<f32>,
    /// Derived blocks `(local_i, local_j, kx)` ordered as [`DERIVED_VARIABLES`].
    derived: Vec<Array3<f32>>,
}

impl Fragment {
    /// Decode the fragment of `worker`.
    pub fn read(
        path: &Path,
        order: ByteOrder,
        worker: &WorkerExtent,
        kx: usize,
        mtype: usize,
    ) -> Result<Self> {
        let buf = read_file(path)?;
        Self::decode(path, &buf, order, worker.local, kx, mtype)
    }

    pub fn decode(
        path: &Path,
        buf: &[u8],
        order: ByteOrder,
        local: (usize, usize),
        kx: usize,
        mtype: usize,
    ) -> Result<Self> {
        let (li, lj) = local;
        let block = li * lj * kx;
        let mut reader = RecordReader::new(path, buf, order);

        let primary = Array4::from_shape_vec((li, lj, kx, mtype).f(), reader.f32s(block * mtype)?)
            .map_err(|e| ReaderError::malformed(path, e.to_string()))?;

        let mut derived = Vec::with_capacity(DERIVED_VARIABLES.len());
        for _ in DERIVED_VARIABLES {
            let values = reader.f32s(block)?;
            derived.push(
                Array3::from_shape_vec((li, lj, kx).f(), values)
                    .map_err(|e| ReaderError::malformed(path, e.to_string()))?,
            );
        }

        Ok(Self { primary, derived })
    }

    pub fn field(&self, field: Field) -> Option<ArrayView3<'_, f32>> {
        match field {
            Field::Primary(m) if m < self.primary.len_of(Axis(3)) => {
                Some(self.primary.index_axis(Axis(3), m))
            }
            Field::Derived(d) => self.derived.get(d).map(|a| a.view()),
            _ => None,
        }
    }
}
