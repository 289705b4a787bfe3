//! Reader for R2D2 simulation output.
//!
//! An R2D2 run writes its state as one binary fragment per worker plus a set
//! of derived 2D products. This crate loads the run metadata once and turns
//! those fragments back into global arrays: full volumes, planes, boxes,
//! single decomposition rows, optical-depth surfaces, fixed slices and
//! restart snapshots.
//!
//! # Architecture
//!
//! ```text
//! Dataset::open(datadir)
//!      │
//!      ├─► RunMetadata::load  (params, grid, background, decomposition, EOS)
//!      │
//!      ▼
//! query variant .read(...)
//!      │
//!      ├─► validate variable names against the catalogue
//!      │
//!      ├─► FieldBuffers::prepare  (reuse arrays of the same shape)
//!      │
//!      └─► ReconstructionEngine::reconstruct_into(box, step)
//!               │
//!               ├─► skip workers outside the box
//!               │
//!               └─► decode fragment, copy overlap into the output views
//! ```
//!
//! # Example
//!
//! ```ignore
//! use r2d2_reader::{Dataset, PhysicalBounds, ZarrOptions, ZarrStore};
//!
//! let mut data = Dataset::open("/work/runs/d001/data")?;
//! data.full.read(12, ["ro", "vx"])?;
//! let density = data.full.get("ro").unwrap();
//!
//! let bounds = PhysicalBounds::new((-2.0e8, 0.0), (0.0, 1.0e9), (0.0, 1.0e9));
//! data.bounding_box.read(12, "all", bounds)?;
//!
//! let store = ZarrStore::create("/work/runs/d001/zarr/step012")?;
//! store.save_buffers(data.full.buffers(), &ZarrOptions::default())?;
//! ```

pub mod cache;
pub mod catalogue;
pub mod config;
pub mod dataset;
pub mod decomposition;
pub mod engine;
pub mod eos;
pub mod error;
pub mod fragment;
pub mod grid;
pub mod layout;
pub mod metadata;
pub mod overset;
pub mod params;
pub mod query;
pub mod zarr_store;

// Re-export commonly used types at crate root
pub use cache::{BufferStats, FieldBuffers};
pub use catalogue::{Field, VariableCatalogue, Variables, DERIVED_VARIABLES, PRIMARY_VARIABLES};
pub use config::ReaderConfig;
pub use dataset::Dataset;
pub use decomposition::{DecompositionIndex, WorkerExtent};
pub use engine::{FieldTarget, IndexBox, ReconstructionEngine, ReconstructionStats, Region};
pub use eos::{EosQuantity, EosTable};
pub use error::{ReaderError, Result};
pub use fragment::{FragmentLayout, FragmentResolver};
pub use grid::{Dimensionality, Geometry, GridDescription, YinYangPatch};
pub use layout::ByteOrder;
pub use metadata::{RunMetadata, RunSummary, SliceAxis, TimeSeries};
pub use overset::{yang_to_yin, OversetGeometry};
pub use query::{
    ArbitrarySlice, BoundingBox, CheckpointSelector, CheckpointSnapshot, FullVolume, HeightPlane,
    OnTheFlyGroup, OnTheFlyProfiles, OpticalDepthSurfaces, Patch, PhysicalBounds,
    SingleColumnRegion, TauLevel, ZPlane, TAU_QUANTITIES,
};
pub use zarr_store::{ZarrOptions, ZarrStore};
