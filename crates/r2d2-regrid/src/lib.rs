//! Regridder for R2D2 runs.
//!
//! Reads a restart checkpoint through `r2d2-reader`, interpolates every
//! primary variable onto a new grid and writes the result in the layout
//! the simulation expects for a cold start.
//!
//! # Architecture
//!
//! ```text
//! RegridRequest (YAML)
//!      │
//!      ├─► validate axes and stretching
//!      │
//!      ▼
//! Regridder::run
//!      │
//!      ├─► reject existing or source destinations
//!      ├─► generate target coordinates (uniform / top-concentrated)
//!      ├─► CheckpointSnapshot::read
//!      ├─► Interpolator3d per variable
//!      │
//!      └─► ColdStartWriter  (qq/, time/, param/nd.dac, cont_log.txt)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use r2d2_reader::{ReaderConfig, RunMetadata};
//! use r2d2_regrid::{RegridRequest, Regridder};
//!
//! let metadata = Arc::new(RunMetadata::load("/work/runs/d001/data", &ReaderConfig::default())?);
//! let request = RegridRequest::from_yaml_file("regrid.yaml")?;
//! let report = Regridder::new(metadata).run(&request)?;
//! ```

pub mod config;
pub mod coords;
pub mod error;
pub mod interpolation;
pub mod provenance;
mod regridder;
pub mod writer;

// Re-exports
pub use config::{AxisSpec, RegridRequest, TopStretch};
pub use error::{RegridError, Result};
pub use interpolation::{Axes, Interpolator3d, TrilinearInterpolator};
pub use provenance::{GridParameters, ProvenanceLog};
pub use regridder::{RegridReport, Regridder, TargetGrid};
pub use writer::{copy_run_skeleton, ColdStartWriter};
