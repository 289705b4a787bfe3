//! Zarr V3 export of reconstructed arrays.
//!
//! A store is a directory holding one root group with one float32 array per
//! variable, compressed with Blosc zstd and bit shuffle. Volumes and planes
//! are chunked with [`ZarrOptions::chunks`], profiles with
//! [`ZarrOptions::profile_chunk`]. Chunks never exceed the array extent.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::BytesToBytesCodecTraits;
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs::storage::{ListableStorageTraits, StorePrefix};
use zarrs_filesystem::FilesystemStore;

use crate::cache::FieldBuffers;
use crate::error::{ReaderError, Result};

/// Chunking and compression of exported arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZarrOptions {
    /// Chunk shape of volumes; planes use the first two entries.
    pub chunks: [u64; 3],
    /// Chunk length of 1D arrays.
    pub profile_chunk: u64,
    /// Blosc compression level (0-9).
    pub compression_level: u8,
}

impl Default for ZarrOptions {
    fn default() -> Self {
        Self {
            chunks: [64, 64, 64],
            profile_chunk: 32,
            compression_level: 5,
        }
    }
}

impl ZarrOptions {
    /// Load options from environment variables.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("R2D2_ZARR_CHUNK") {
            if let Ok(n) = val.parse::<u64>() {
                options.chunks = [n; 3];
            }
        }

        if let Ok(val) = std::env::var("R2D2_ZARR_PROFILE_CHUNK") {
            if let Ok(n) = val.parse() {
                options.profile_chunk = n;
            }
        }

        if let Ok(val) = std::env::var("R2D2_ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                options.compression_level = level;
            }
        }

        options
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.chunks.contains(&0) || self.profile_chunk == 0 {
            return Err("zarr chunk sizes must be positive".to_string());
        }
        if self.compression_level > 9 {
            return Err(format!(
                "zarr compression level {} is outside 0-9",
                self.compression_level
            ));
        }
        Ok(())
    }

    fn chunk_shape(&self, shape: &[u64]) -> Option<Vec<u64>> {
        let chunks = match shape.len() {
            1 => vec![self.profile_chunk],
            2 | 3 => self.chunks[..shape.len()].to_vec(),
            _ => return None,
        };
        Some(
            chunks
                .iter()
                .zip(shape)
                .map(|(&c, &n)| c.min(n).max(1))
                .collect(),
        )
    }
}

/// Directory-backed zarr group of named float32 arrays.
pub struct ZarrStore {
    path: PathBuf,
    store: Arc<FilesystemStore>,
}

impl ZarrStore {
    /// Create the store directory and its root group.
    ///
    /// Arrays already in an existing store are kept; saving under the same
    /// name replaces them.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path).map_err(|e| ReaderError::zarr(path, e.to_string()))?;
        let store = Self::filesystem(path)?;

        let group = GroupBuilder::new()
            .build(store.clone(), "/")
            .map_err(|e| ReaderError::zarr(path, e.to_string()))?;
        group
            .store_metadata()
            .map_err(|e| ReaderError::zarr(path, e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            store,
        })
    }

    /// Open an existing store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.join("zarr.json").is_file() {
            return Err(ReaderError::MissingFile(path.join("zarr.json")));
        }
        Ok(Self {
            path: path.to_path_buf(),
            store: Self::filesystem(path)?,
        })
    }

    fn filesystem(path: &Path) -> Result<Arc<FilesystemStore>> {
        let store = FilesystemStore::new(path).map_err(|e| ReaderError::zarr(path, e.to_string()))?;
        Ok(Arc::new(store))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `data` as array `name`, replacing any array of that name.
    ///
    /// Only 1D, 2D and 3D arrays are accepted.
    pub fn save(&self, name: &str, data: ArrayViewD<'_, f32>, options: &ZarrOptions) -> Result<()> {
        options.validate().map_err(ReaderError::Config)?;
        if name.is_empty() || name.contains('/') || name.starts_with('.') {
            return Err(self.error(format!("'{}' is not a valid array name", name)));
        }

        let shape: Vec<u64> = data.shape().iter().map(|&n| n as u64).collect();
        let chunks = options.chunk_shape(&shape).ok_or_else(|| {
            self.error(format!(
                "variable '{}' has {} dimensions, expected 1 to 3",
                name,
                shape.len()
            ))
        })?;

        let node = self.path.join(name);
        if node.exists() {
            fs::remove_dir_all(&node).map_err(|e| self.error(e.to_string()))?;
        }

        let chunk_grid: zarrs::array::ChunkGrid = chunks
            .clone()
            .try_into()
            .map_err(|e| self.error(format!("{:?}", e)))?;

        let mut attrs = serde_json::Map::new();
        attrs.insert("variable".to_string(), serde_json::json!(name));

        let mut binding = ArrayBuilder::new(
            shape.clone(),
            DataType::Float32,
            chunk_grid,
            FillValue::from(f32::NAN),
        );
        let array = binding
            .bytes_to_bytes_codecs(vec![self.codec(options)?])
            .attributes(attrs)
            .build(self.store.clone(), &format!("/{}", name))
            .map_err(|e| self.error(e.to_string()))?;
        array
            .store_metadata()
            .map_err(|e| self.error(e.to_string()))?;

        if !data.is_empty() {
            let subset = ArraySubset::new_with_shape(shape.clone());
            let elements: Vec<f32> = data.iter().copied().collect();
            array
                .store_array_subset_elements(&subset, &elements)
                .map_err(|e| self.error(e.to_string()))?;
        }

        tracing::debug!(
            store = %self.path.display(),
            variable = name,
            shape = ?shape,
            chunks = ?chunks,
            "Saved zarr array"
        );
        Ok(())
    }

    /// Write every array held by `buffers`. Returns the number written.
    pub fn save_buffers<D: Dimension>(
        &self,
        buffers: &FieldBuffers<f32, D>,
        options: &ZarrOptions,
    ) -> Result<usize> {
        for (name, array) in buffers.iter() {
            self.save(name, array.view().into_dyn(), options)?;
        }
        tracing::info!(
            store = %self.path.display(),
            variables = buffers.len(),
            "Exported buffers to zarr"
        );
        Ok(buffers.len())
    }

    /// Read array `name` back in full.
    pub fn load(&self, name: &str) -> Result<ArrayD<f32>> {
        if name.is_empty() || !self.path.join(name).join("zarr.json").is_file() {
            return Err(ReaderError::unknown_variable(name, &self.variables()?));
        }
        let array = Array::open(self.store.clone(), &format!("/{}", name))
            .map_err(|e| self.error(e.to_string()))?;

        let subset = ArraySubset::new_with_shape(array.shape().to_vec());
        let elements: Vec<f32> = array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| self.error(format!("array '{}': {}", name, e)))?;
        let shape: Vec<usize> = array.shape().iter().map(|&n| n as usize).collect();
        ArrayD::from_shape_vec(IxDyn(&shape), elements)
            .map_err(|e| self.error(format!("array '{}': {}", name, e)))
    }

    /// Names of the arrays in the store, sorted.
    pub fn variables(&self) -> Result<Vec<String>> {
        let listing = self
            .store
            .list_dir(&StorePrefix::root())
            .map_err(|e| self.error(e.to_string()))?;

        let mut names: Vec<String> = listing
            .prefixes()
            .iter()
            .map(|prefix| prefix.as_str().trim_end_matches('/').to_string())
            .filter(|name| Array::open(self.store.clone(), &format!("/{}", name)).is_ok())
            .collect();
        names.sort();
        Ok(names)
    }

    fn codec(&self, options: &ZarrOptions) -> Result<Arc<dyn BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(options.compression_level)
            .map_err(|_| ReaderError::Config("invalid zarr compression level".to_string()))?;
        let codec = BloscCodec::new(
            BloscCompressor::Zstd,
            level,
            None,
            BloscShuffleMode::BitShuffle,
            Some(std::mem::size_of::<f32>()),
        )
        .map_err(|e| ReaderError::Config(e.to_string()))?;
        Ok(Arc::new(codec))
    }

    fn error(&self, message: impl Into<String>) -> ReaderError {
        ReaderError::zarr(&self.path, message)
    }
}
