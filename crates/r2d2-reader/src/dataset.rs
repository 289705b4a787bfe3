//! A reading session over one run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::fragment::FragmentResolver;
use crate::metadata::{RunMetadata, TimeSeries};
use crate::query::{
    ArbitrarySlice, BoundingBox, CheckpointSnapshot, FullVolume, HeightPlane, OnTheFlyProfiles,
    OpticalDepthSurfaces, SingleColumnRegion, ZPlane,
};

/// Run metadata plus one instance of every query variant, all sharing the
/// same [`RunMetadata`].
#[derive(Debug)]
pub struct Dataset {
    metadata: Arc<RunMetadata>,
    pub full: FullVolume,
    pub height_plane: HeightPlane,
    pub z_plane: ZPlane,
    pub bounding_box: BoundingBox,
    pub column: SingleColumnRegion,
    pub optical_depth: OpticalDepthSurfaces,
    pub slice: ArbitrarySlice,
    pub checkpoint: CheckpointSnapshot,
    pub on_the_fly: OnTheFlyProfiles,
}

impl Dataset {
    /// Open the run at `datadir` with the default configuration.
    pub fn open(datadir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(datadir, &ReaderConfig::default())
    }

    pub fn open_with_config(datadir: impl AsRef<Path>, config: &ReaderConfig) -> Result<Self> {
        let metadata = Arc::new(RunMetadata::load(datadir, config)?);

        let grid = metadata.grid();
        tracing::info!(
            datadir = %metadata.datadir().display(),
            geometry = %grid.geometry,
            ix = grid.ix,
            jx = grid.jx,
            kx = grid.kx,
            nd = metadata.steps().nd,
            "Opened R2D2 dataset"
        );

        Ok(Self::from_metadata(metadata))
    }

    /// Build a session around metadata that is already loaded.
    pub fn from_metadata(metadata: Arc<RunMetadata>) -> Self {
        Self {
            full: FullVolume::new(metadata.clone()),
            height_plane: HeightPlane::new(metadata.clone()),
            z_plane: ZPlane::new(metadata.clone()),
            bounding_box: BoundingBox::new(metadata.clone()),
            column: SingleColumnRegion::new(metadata.clone()),
            optical_depth: OpticalDepthSurfaces::new(metadata.clone()),
            slice: ArbitrarySlice::new(metadata.clone()),
            checkpoint: CheckpointSnapshot::new(metadata.clone()),
            on_the_fly: OnTheFlyProfiles::new(metadata.clone()),
            metadata,
        }
    }

    pub fn metadata(&self) -> &Arc<RunMetadata> {
        &self.metadata
    }

    pub fn datadir(&self) -> &Path {
        self.metadata.datadir()
    }

    /// Simulation time of `step`.
    pub fn time(&self, step: u32, series: TimeSeries) -> Result<f64> {
        self.metadata.time(step, series)
    }

    /// Fragment paths a full read of `step` opens, in visitation order.
    pub fn fragment_manifest(&self, step: u32) -> Result<Vec<PathBuf>> {
        let decomposition = self.metadata.decomposition()?;
        Ok(FragmentResolver::new(self.metadata.datadir()).manifest(step, decomposition))
    }
}
