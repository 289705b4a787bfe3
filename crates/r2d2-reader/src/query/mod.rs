//! Query variants over a run's products.
//!
//! Each variant owns the arrays of its last read, keyed by variable name and
//! held in a [`FieldBuffers`] set so that repeated reads of the same shape
//! reuse memory. Variable names are validated against the catalogue before
//! any file is opened.

mod bounding_box;
mod checkpoint;
mod column;
mod full_volume;
mod on_the_fly;
mod optical_depth;
mod plane;
mod slice;

pub use bounding_box::{BoundingBox, PhysicalBounds};
pub use checkpoint::{CheckpointSelector, CheckpointSnapshot};
pub use column::SingleColumnRegion;
pub use full_volume::FullVolume;
pub use on_the_fly::{OnTheFlyGroup, OnTheFlyProfiles};
pub use optical_depth::{OpticalDepthSurfaces, TauLevel, TAU_QUANTITIES};
pub use plane::{HeightPlane, ZPlane};
pub use slice::{ArbitrarySlice, Patch};

use ndarray::{ArrayViewMut, ArrayViewMut3, Dimension};

use crate::cache::FieldBuffers;
use crate::catalogue::Variables;
use crate::engine::{FieldTarget, IndexBox, ReconstructionEngine, ReconstructionStats};
use crate::error::Result;
use crate::metadata::RunMetadata;

/// Turns a variant's output view into the 3D view the engine writes into.
type Lift<D> = fn(ArrayViewMut<'_, f32, D>) -> ArrayViewMut3<'_, f32>;

fn volume_view(view: ArrayViewMut3<'_, f32>) -> ArrayViewMut3<'_, f32> {
    view
}

/// Reconstruct `variables` over `bx` into `buffers`, each array of `shape`.
fn read_into_buffers<D: Dimension>(
    metadata: &RunMetadata,
    buffers: &mut FieldBuffers<f32, D>,
    shape: D,
    bx: &IndexBox,
    step: u32,
    variables: &Variables,
    lift: Lift<D>,
) -> Result<ReconstructionStats> {
    let selected = metadata.catalogue().select(variables)?;
    let engine = ReconstructionEngine::new(metadata)?;

    if buffers.prepare(shape, selected.iter().map(|(name, _)| name.as_str())) {
        tracing::debug!(
            shape = ?bx.shape(),
            variables = selected.len(),
            "Allocated query buffers"
        );
    }

    let mut targets = Vec::with_capacity(selected.len());
    for (name, array) in buffers.iter_mut() {
        if let Some((_, field)) = selected.iter().find(|(n, _)| n == name) {
            targets.push(FieldTarget::new(*field, lift(array.view_mut())));
        }
    }
    engine.reconstruct_into(bx, step, &mut targets)
}
