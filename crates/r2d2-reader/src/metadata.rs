//! Run metadata: everything describing a run that is independent of the
//! time step being read.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;

use crate::catalogue::VariableCatalogue;
use crate::config::ReaderConfig;
use crate::decomposition::{DecompositionIndex, DecompositionShape};
use crate::eos::EosTable;
use crate::error::{ReaderError, Result};
use crate::grid::{load_grid, Background, Dimensionality, Geometry, GridCounts, GridDescription};
use crate::layout::{read_file, read_fortran_i32_record, step_label, ByteOrder, RecordReader};
use crate::overset::OversetGeometry;
use crate::params::{ParamTable, StepCounters};

/// Solar radius in cm, used when the run does not record `rstar`.
pub const RSUN: f64 = 6.957e10;

/// Solar luminosity in erg/s, used when the run does not record `lstar`.
pub const LSUN: f64 = 3.828e33;

/// Time series recorded under `time/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSeries {
    /// Times of the 3D and 2D products (`time/mhd`).
    Mhd,
    /// Times of the optical-depth products (`time/tau`).
    Tau,
}

impl TimeSeries {
    fn dir(&self) -> &'static str {
        match self {
            Self::Mhd => "mhd",
            Self::Tau => "tau",
        }
    }
}

/// Positions of the arbitrary-slice planes from `slice/`.
#[derive(Debug, Clone, Serialize)]
pub struct SliceMetadata {
    pub x_slice: Vec<f64>,
    pub y_slice: Vec<f64>,
    pub z_slice: Vec<f64>,
}

impl SliceMetadata {
    fn load(slice_dir: &Path, order: ByteOrder) -> Result<Self> {
        let params_path = slice_dir.join("params.dac");
        let text = std::fs::read_to_string(&params_path)
            .map_err(|e| ReaderError::read_failed(&params_path, e))?;

        let mut counts = [None; 3];
        for line in text.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                continue;
            }
            let slot = match parts[1] {
                "nx_slice" => 0,
                "ny_slice" => 1,
                "nz_slice" => 2,
                _ => continue,
            };
            let value = parts[0].parse::<usize>().map_err(|e| {
                ReaderError::malformed(&params_path, format!("{}: {}", parts[1], e))
            })?;
            counts[slot] = Some(value);
        }
        let [nx, ny, nz] = counts;
        let (nx, ny, nz) = match (nx, ny, nz) {
            (Some(nx), Some(ny), Some(nz)) => (nx, ny, nz),
            _ => {
                return Err(ReaderError::malformed(
                    &params_path,
                    "expected nx_slice, ny_slice and nz_slice",
                ))
            }
        };

        let positions = slice_dir.join("slice.dac");
        let buf = read_file(&positions)?;
        let mut reader = RecordReader::new(&positions, &buf, order);
        Ok(Self {
            x_slice: reader.f64s(nx)?,
            y_slice: reader.f64s(ny)?,
            z_slice: reader.f64s(nz)?,
        })
    }

    /// Number of planes normal to `axis`.
    pub fn count(&self, axis: SliceAxis) -> usize {
        self.positions(axis).len()
    }

    pub fn positions(&self, axis: SliceAxis) -> &[f64] {
        match axis {
            SliceAxis::X => &self.x_slice,
            SliceAxis::Y => &self.y_slice,
            SliceAxis::Z => &self.z_slice,
        }
    }
}

/// Axis normal to an arbitrary slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SliceAxis {
    X,
    Y,
    Z,
}

impl SliceAxis {
    pub fn letter(&self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Z => 'z',
        }
    }
}

impl std::str::FromStr for SliceAxis {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            "z" => Ok(Self::Z),
            other => Err(ReaderError::unknown_variable(other, &["x", "y", "z"])),
        }
    }
}

/// Groups and names of the on-the-fly 2D diagnostics (`remap/vl/c.dac`).
#[derive(Debug, Clone, Serialize)]
pub struct OnTheFlyCatalogue {
    /// Quantities on the (first, second) axis plane.
    pub m2d_xy: usize,
    /// Quantities on the (first, third) axis plane.
    pub m2d_xz: usize,
    /// Quantities on the face-centred first axis and second axis.
    pub m2d_flux: usize,
    /// Spectral quantities, present for Yin-Yang runs only.
    pub m2d_spex: Option<usize>,
    /// Names in storage order across all groups.
    pub names: Vec<String>,
}

impl OnTheFlyCatalogue {
    fn load(path: &Path, yin_yang: bool) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ReaderError::read_failed(path, e))?;
        let mut tokens = text.split_whitespace();
        let mut count = |what: &str| -> Result<usize> {
            tokens
                .next()
                .ok_or_else(|| ReaderError::malformed(path, format!("missing {}", what)))?
                .parse::<usize>()
                .map_err(|e| ReaderError::malformed(path, format!("{}: {}", what, e)))
        };

        let m2d_xy = count("m2d_xy")?;
        let m2d_xz = count("m2d_xz")?;
        let m2d_flux = count("m2d_flux")?;
        let m2d_spex = if yin_yang { Some(count("m2d_spex")?) } else { None };
        let names: Vec<String> = tokens.map(|t| t.trim().to_string()).collect();

        let catalogue = Self {
            m2d_xy,
            m2d_xz,
            m2d_flux,
            m2d_spex,
            names,
        };
        if catalogue.names.len() < catalogue.total() {
            return Err(ReaderError::malformed(
                path,
                format!(
                    "{} names listed for {} quantities",
                    catalogue.names.len(),
                    catalogue.total()
                ),
            ));
        }
        Ok(catalogue)
    }

    pub fn total(&self) -> usize {
        self.m2d_xy + self.m2d_xz + self.m2d_flux + self.m2d_spex.unwrap_or(0)
    }
}

/// Summary of a run suitable for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub datadir: PathBuf,
    pub geometry: Geometry,
    pub dimensionality: Dimensionality,
    pub grid: [usize; 3],
    pub margin: usize,
    pub nd: u32,
    pub nd_tau: u32,
    pub workers: usize,
    pub rstar: f64,
    pub lstar: f64,
    pub byte_order: ByteOrder,
    pub x_range: (f64, f64),
    pub origin: Option<String>,
    pub has_eos: bool,
    pub has_slices: bool,
}

impl RunSummary {
    /// Pretty-printed JSON, as published alongside run reports.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Metadata of one run, loaded once and shared by every reader.
#[derive(Debug)]
pub struct RunMetadata {
    datadir: PathBuf,
    config: ReaderConfig,
    params: ParamTable,
    steps: StepCounters,
    byte_order: ByteOrder,
    grid: GridDescription,
    background: Background,
    rstar: f64,
    lstar: f64,
    /// Worker grid position of every simulation worker, from `param/xyz.dac`.
    worker_positions: Vec<[i32; 3]>,
    catalogue: VariableCatalogue,
    decomposition: Option<DecompositionIndex>,
    on_the_fly: Option<OnTheFlyCatalogue>,
    slices: Option<SliceMetadata>,
    eos: Option<EosTable>,
    origin: Option<String>,
    overset: OnceLock<OversetGeometry>,
}

impl RunMetadata {
    /// Load the metadata of the run whose output directory is `datadir`.
    pub fn load(datadir: impl AsRef<Path>, config: &ReaderConfig) -> Result<Self> {
        config.validate().map_err(ReaderError::Config)?;
        let datadir = datadir.as_ref().to_path_buf();
        let param_dir = datadir.join("param");

        let mut steps = StepCounters::load(&param_dir.join("nd.dac"))?;
        steps.reconcile_tau(&datadir.join("time").join("tau"));

        let params = ParamTable::load(&param_dir.join("params.dac"))?;
        let byte_order = ByteOrder::from_swap_flag(params.int("swap")?);
        let rstar = params.double_or("rstar", RSUN)?;
        let lstar = params.double_or("lstar", LSUN)?;

        let counts = GridCounts::from_params(&params)?;
        let npe = params.count("ix0")? * params.count("jx0")? * params.count("kx0")?;
        let raw_positions = read_fortran_i32_record(&param_dir.join("xyz.dac"), byte_order, npe * 3)?;
        let worker_positions = (0..npe)
            .map(|p| [raw_positions[p], raw_positions[p + npe], raw_positions[p + 2 * npe]])
            .collect();

        let (grid, background) = load_grid(&param_dir.join("back.dac"), &counts, byte_order, rstar)?;
        let catalogue = VariableCatalogue::new(params.count("mtype")?);

        let mut decomposition = None;
        let mut on_the_fly = None;
        let mut slices = None;
        if grid.dimensionality == Dimensionality::ThreeD {
            let remap_dir = datadir.join("remap");
            let shape = DecompositionShape {
                npe: if params.contains("npe") { params.count("npe")? } else { npe },
                rows: params.count("ixr")?,
                cols: params.count("jxr")?,
                ixg: grid.ixg,
                jxg: grid.jxg,
                ghost: (grid.ghost[0], grid.ghost[1]),
            };
            let index = DecompositionIndex::load(&remap_dir.join("remap_info.dac"), byte_order, shape)?;
            if config.validate_tiling {
                index.validate_tiling(grid.ix, grid.jx)?;
            }
            decomposition = Some(index);

            let catalogue_path = remap_dir.join("vl").join("c.dac");
            if catalogue_path.is_file() {
                on_the_fly = optional_product(
                    &catalogue_path,
                    OnTheFlyCatalogue::load(&catalogue_path, grid.geometry == Geometry::YinYang),
                );
            }

            let slice_dir = datadir.join("slice");
            if slice_dir.is_dir() {
                slices = optional_product(&slice_dir, SliceMetadata::load(&slice_dir, byte_order));
            }
        }

        let eos = if config.load_eos {
            let archive = match &config.eos_archive {
                Some(path) => Some(path.clone()),
                None => default_eos_archive(&datadir),
            };
            match archive {
                Some(path) if path.is_file() && config.eos_archive.is_some() => {
                    Some(EosTable::load_npz(&path)?)
                }
                Some(path) if path.is_file() => optional_product(&path, EosTable::load_npz(&path)),
                Some(path) if config.eos_archive.is_some() => {
                    return Err(ReaderError::MissingFile(path));
                }
                _ => None,
            }
        } else {
            None
        };

        let origin = read_origin(&datadir.join("cont_log.txt"));

        tracing::debug!(
            datadir = %datadir.display(),
            geometry = %grid.geometry,
            ix = grid.ix,
            jx = grid.jx,
            kx = grid.kx,
            nd = steps.nd,
            has_eos = eos.is_some(),
            "Loaded run metadata"
        );

        Ok(Self {
            datadir,
            config: config.clone(),
            params,
            steps,
            byte_order,
            grid,
            background,
            rstar,
            lstar,
            worker_positions,
            catalogue,
            decomposition,
            on_the_fly,
            slices,
            eos,
            origin,
            overset: OnceLock::new(),
        })
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn params(&self) -> &ParamTable {
        &self.params
    }

    pub fn steps(&self) -> StepCounters {
        self.steps
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn grid(&self) -> &GridDescription {
        &self.grid
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn rstar(&self) -> f64 {
        self.rstar
    }

    pub fn lstar(&self) -> f64 {
        self.lstar
    }

    pub fn worker_positions(&self) -> &[[i32; 3]] {
        &self.worker_positions
    }

    pub fn catalogue(&self) -> &VariableCatalogue {
        &self.catalogue
    }

    pub fn decomposition(&self) -> Result<&DecompositionIndex> {
        self.decomposition
            .as_ref()
            .ok_or(ReaderError::CapabilityUnavailable("remapped 3D output"))
    }

    pub fn on_the_fly(&self) -> Result<&OnTheFlyCatalogue> {
        self.on_the_fly
            .as_ref()
            .ok_or(ReaderError::CapabilityUnavailable("on-the-fly diagnostics"))
    }

    pub fn slices(&self) -> Result<&SliceMetadata> {
        self.slices
            .as_ref()
            .ok_or(ReaderError::CapabilityUnavailable("arbitrary slice output"))
    }

    pub fn eos(&self) -> Result<&EosTable> {
        self.eos
            .as_ref()
            .ok_or(ReaderError::CapabilityUnavailable("EOS table"))
    }

    /// Name of the case this run was restarted from, if recorded.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Yin-Yang overset geometry, computed on first use.
    pub fn overset(&self) -> Result<&OversetGeometry> {
        let patch = self
            .grid
            .yin_yang
            .as_ref()
            .ok_or(ReaderError::CapabilityUnavailable("Yin-Yang overset geometry"))?;
        Ok(self.overset.get_or_init(|| OversetGeometry::build(patch)))
    }

    /// Whether the overset geometry has been computed yet.
    pub fn overset_ready(&self) -> bool {
        self.overset.get().is_some()
    }

    /// Path of the time stamp of `step` in `series`.
    pub fn time_path(&self, step: u32, series: TimeSeries) -> PathBuf {
        self.datadir
            .join("time")
            .join(series.dir())
            .join(format!("t.dac.{}", step_label(step)))
    }

    /// Simulation time of `step` in `series`.
    pub fn time(&self, step: u32, series: TimeSeries) -> Result<f64> {
        let path = self.time_path(step, series);
        let buf = read_file(&path)?;
        let mut reader = RecordReader::new(&path, &buf, self.byte_order);
        Ok(reader.f64s(1)?[0])
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            datadir: self.datadir.clone(),
            geometry: self.grid.geometry,
            dimensionality: self.grid.dimensionality,
            grid: [self.grid.ix, self.grid.jx, self.grid.kx],
            margin: self.grid.margin,
            nd: self.steps.nd,
            nd_tau: self.steps.nd_tau,
            workers: self.worker_positions.len(),
            rstar: self.rstar,
            lstar: self.lstar,
            byte_order: self.byte_order,
            x_range: (
                self.grid.x.first().copied().unwrap_or(f64::NAN),
                self.grid.x.last().copied().unwrap_or(f64::NAN),
            ),
            origin: self.origin.clone(),
            has_eos: self.eos.is_some(),
            has_slices: self.slices.is_some(),
        }
    }
}

/// Keep an optional product that failed to load out of the metadata.
fn optional_product<T>(path: &Path, loaded: Result<T>) -> Option<T> {
    match loaded {
        Ok(product) => Some(product),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable optional product");
            None
        }
    }
}

/// `<run>/input_data/eos_table_sero.npz`, the run directory being the parent
/// of `datadir`.
fn default_eos_archive(datadir: &Path) -> Option<PathBuf> {
    let run_dir = datadir.parent()?;
    Some(run_dir.join("input_data").join("eos_table_sero.npz"))
}

/// Case name recorded on the seventh line of `cont_log.txt`, of the form
/// `Datadir: <path>/<case>/data/`.
fn read_origin(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let line = text.lines().nth(6)?;
    let value = line.split_once(':').map(|(_, v)| v).unwrap_or(line).trim();
    let data_dir = Path::new(value.trim_end_matches('/'));
    data_dir
        .parent()
        .and_then(|p| p.file_name())
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cont_log.txt");
        let text = "line1\nline2\n\n### Original data ###\n\nServer: cluster\nDatadir: /work/runs/d042/data/\nOutput step: 10\n";
        std::fs::write(&path, text).unwrap();
        assert_eq!(read_origin(&path).as_deref(), Some("d042"));

        std::fs::write(&path, "short\n").unwrap();
        assert!(read_origin(&path).is_none());
        assert!(read_origin(&dir.path().join("absent.txt")).is_none());
    }

    #[test]
    fn test_default_eos_archive() {
        let path = default_eos_archive(Path::new("/work/runs/d042/data")).unwrap();
        assert_eq!(path, PathBuf::from("/work/runs/d042/input_data/eos_table_sero.npz"));
    }

    #[test]
    fn test_slice_axis_parse() {
        assert_eq!("y".parse::<SliceAxis>().unwrap(), SliceAxis::Y);
        assert!("w".parse::<SliceAxis>().is_err());
        assert_eq!(SliceAxis::Z.letter(), 'z');
    }

    #[test]
    fn test_on_the_fly_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.dac");
        std::fs::write(&path, "2 1 1\n ro_xy \n vx_xy\n se_xz\n fx_flux\n").unwrap();
        let catalogue = OnTheFlyCatalogue::load(&path, false).unwrap();
        assert_eq!(catalogue.total(), 4);
        assert_eq!(catalogue.names, vec!["ro_xy", "vx_xy", "se_xz", "fx_flux"]);

        std::fs::write(&path, "2 1 1 3\n a b c d\n").unwrap();
        assert!(OnTheFlyCatalogue::load(&path, true).is_err());
    }
}
