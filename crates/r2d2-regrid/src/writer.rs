//! Cold-start layout of a regridded run.
//!
//! The simulation starts from `qq/qq.dac.e` (or one `qq/qq{m:02}.dac.e`
//! per variable), the time stamp `time/mhd/t.dac.e` and step counters of
//! zero. Every other output directory is created empty.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{ArrayView3, Axis};
use r2d2_reader::ByteOrder;
use walkdir::WalkDir;

use crate::error::{RegridError, Result};

/// Directories the simulation expects under `data/`.
pub const COLD_START_DIRS: [&str; 8] = [
    "param",
    "qq",
    "slice",
    "remap/qq",
    "remap/vl",
    "time/mhd",
    "time/tau",
    "tau",
];

/// Writes the initial condition of a new run.
#[derive(Debug, Clone)]
pub struct ColdStartWriter {
    datadir: PathBuf,
    order: ByteOrder,
}

impl ColdStartWriter {
    pub fn new(datadir: impl Into<PathBuf>, order: ByteOrder) -> Self {
        Self {
            datadir: datadir.into(),
            order,
        }
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// Create the output directories.
    pub fn create_layout(&self) -> Result<()> {
        for dir in COLD_START_DIRS {
            let path = self.datadir.join(dir);
            fs::create_dir_all(&path).map_err(|e| RegridError::io(&path, e))?;
        }
        Ok(())
    }

    fn write_file(&self, relative: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.datadir.join(relative);
        fs::write(&path, bytes).map_err(|e| RegridError::io(&path, e))?;
        Ok(path)
    }

    fn encode_fields<'a>(&self, fields: impl IntoIterator<Item = ArrayView3<'a, f64>>) -> Vec<u8> {
        let mut buf = Vec::new();
        for field in fields {
            buf.reserve(field.len() * 8);
            // Fortran order: first axis fastest
            for plane in field.axis_iter(Axis(2)) {
                for line in plane.axis_iter(Axis(1)) {
                    self.order.encode_f64(&mut buf, line.iter().copied());
                }
            }
        }
        buf
    }

    /// Write all variables into `qq/qq.dac.e`, variables on the slowest axis.
    pub fn write_state<'a>(&self, fields: impl IntoIterator<Item = ArrayView3<'a, f64>>) -> Result<PathBuf> {
        let buf = self.encode_fields(fields);
        self.write_file("qq/qq.dac.e", &buf)
    }

    /// Write variable `m` into its own `qq/qq{m:02}.dac.e`.
    pub fn write_variable(&self, m: usize, field: ArrayView3<'_, f64>) -> Result<PathBuf> {
        let buf = self.encode_fields([field]);
        self.write_file(&format!("qq/qq{:02}.dac.e", m), &buf)
    }

    /// Time stamp and step counters of a run that has not advanced yet.
    pub fn write_initial_step(&self) -> Result<()> {
        let mut buf = Vec::with_capacity(8);
        self.order.encode_f64(&mut buf, [0.0]);
        self.write_file("time/mhd/t.dac.e", &buf)?;
        self.write_file("param/nd.dac", format!("{:8}{:8}", 0, 0).as_bytes())?;
        Ok(())
    }

    pub fn write_provenance(&self, text: &str) -> Result<PathBuf> {
        self.write_file("cont_log.txt", text.as_bytes())
    }
}

/// Copy the run directory `source` into `destination`, leaving out its
/// `data` directory and, when it lies inside `source`, the destination itself.
///
/// Returns the number of files copied.
pub fn copy_run_skeleton(source: &Path, destination: &Path) -> Result<usize> {
    let source = fs::canonicalize(source).map_err(|e| RegridError::io(source, e))?;
    let skip = fs::canonicalize(destination).ok();

    let mut copied = 0;
    let walker = WalkDir::new(&source)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() == 1 && e.file_name() == "data") && Some(e.path()) != skip.as_deref()
        });

    for entry in walker {
        let entry = entry.map_err(|e| RegridError::Skeleton(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(&source)
            .map_err(|e| RegridError::Skeleton(e.to_string()))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| RegridError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| RegridError::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| RegridError::io(&target, e))?;
            copied += 1;
            tracing::debug!(path = %relative.display(), "Copied run file");
        }
    }
    Ok(copied)
}
