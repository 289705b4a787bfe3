//! Tabulated equation of state over (log density, entropy).
//!
//! Tables are stored as natural logarithms and interpolated bilinearly in
//! that space; results are exponentiated back. Lookups outside the table
//! axes are rejected rather than extrapolated.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array, Array1, Array2, ArrayView, Dimension, Zip};
use ndarray_npy::NpzReader;

use crate::error::{ReaderError, Result};

/// Offset added before taking logarithms so that zero entries stay finite.
const LOG_FLOOR: f64 = 1.0e-200;

/// Thermodynamic quantity available from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EosQuantity {
    Pressure,
    Energy,
    Temperature,
    Opacity,
}

impl EosQuantity {
    pub const ALL: [EosQuantity; 4] = [
        Self::Pressure,
        Self::Energy,
        Self::Temperature,
        Self::Opacity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pressure => "pr",
            Self::Energy => "en",
            Self::Temperature => "te",
            Self::Opacity => "op",
        }
    }

    fn slot(&self) -> usize {
        match self {
            Self::Pressure => 0,
            Self::Energy => 1,
            Self::Temperature => 2,
            Self::Opacity => 3,
        }
    }
}

impl FromStr for EosQuantity {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|q| q.name() == s)
            .copied()
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|q| q.name()).collect();
                ReaderError::unknown_variable(s, &names)
            })
    }
}

impl fmt::Display for EosQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equation-of-state table.
#[derive(Debug, Clone)]
pub struct EosTable {
    log_ro: Array1<f64>,
    se: Array1<f64>,
    /// Log tables indexed `[density, entropy]`, ordered as [`EosQuantity::ALL`].
    log_tables: [Array2<f64>; 4],
    log_dprdro: Option<Array2<f64>>,
    dlog_ro: f64,
    dse: f64,
}

impl EosTable {
    /// Load `eos_table_sero.npz`.
    ///
    /// The archive holds `ro` (already logarithmic), `se`, the linear tables
    /// `pr`, `en`, `te`, `op` and optionally `dprdro`.
    pub fn load_npz(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ReaderError::read_failed(path, e))?;
        let mut npz = NpzReader::new(file)
            .map_err(|e| ReaderError::malformed(path, format!("not an npz archive: {}", e)))?;

        let log_ro: Array1<f64> = read_npz_array(&mut npz, path, "ro")?;
        let se: Array1<f64> = read_npz_array(&mut npz, path, "se")?;
        let pr: Array2<f64> = read_npz_array(&mut npz, path, "pr")?;
        let en: Array2<f64> = read_npz_array(&mut npz, path, "en")?;
        let te: Array2<f64> = read_npz_array(&mut npz, path, "te")?;
        let op: Array2<f64> = read_npz_array(&mut npz, path, "op")?;
        let names = npz
            .names()
            .map_err(|e| ReaderError::malformed(path, format!("not an npz archive: {}", e)))?;
        let dprdro = if names.iter().any(|n| n == "dprdro" || n == "dprdro.npy") {
            Some(read_npz_array::<ndarray::Ix2>(&mut npz, path, "dprdro")?)
        } else {
            None
        };

        let mut table = Self::from_linear_tables(log_ro, se, [pr, en, te, op])
            .map_err(|e| ReaderError::malformed(path, e.to_string()))?;
        table.log_dprdro = dprdro.map(|t| t.mapv(|v| (v + LOG_FLOOR).ln()));
        Ok(table)
    }

    /// Build from linear tables ordered as [`EosQuantity::ALL`].
    pub fn from_linear_tables(
        log_ro: Array1<f64>,
        se: Array1<f64>,
        tables: [Array2<f64>; 4],
    ) -> Result<Self> {
        let log_tables = tables.map(|t| t.mapv(|v| (v + LOG_FLOOR).ln()));
        Self::from_log_tables(log_ro, se, log_tables)
    }

    /// Build from tables that are already logarithmic.
    pub fn from_log_tables(
        log_ro: Array1<f64>,
        se: Array1<f64>,
        log_tables: [Array2<f64>; 4],
    ) -> Result<Self> {
        if log_ro.len() < 2 || se.len() < 2 {
            return Err(ReaderError::Config(
                "EOS axes need at least two nodes each".to_string(),
            ));
        }
        for (q, table) in EosQuantity::ALL.iter().zip(&log_tables) {
            if table.dim() != (log_ro.len(), se.len()) {
                return Err(ReaderError::Config(format!(
                    "EOS table {} has shape {:?}, axes are {}x{}",
                    q,
                    table.dim(),
                    log_ro.len(),
                    se.len()
                )));
            }
        }
        let dlog_ro = log_ro[1] - log_ro[0];
        let dse = se[1] - se[0];
        if !(dlog_ro > 0.0 && dse > 0.0) {
            return Err(ReaderError::Config(
                "EOS axes must be increasing".to_string(),
            ));
        }

        Ok(Self {
            log_ro,
            se,
            log_tables,
            log_dprdro: None,
            dlog_ro,
            dse,
        })
    }

    /// Density axis (natural log).
    pub fn log_density_axis(&self) -> &Array1<f64> {
        &self.log_ro
    }

    pub fn entropy_axis(&self) -> &Array1<f64> {
        &self.se
    }

    /// Logarithmic table of `quantity`.
    pub fn log_table(&self, quantity: EosQuantity) -> &Array2<f64> {
        &self.log_tables[quantity.slot()]
    }

    /// Logarithmic `d pr / d ro` table, when the archive carries one.
    pub fn log_dprdro(&self) -> Option<&Array2<f64>> {
        self.log_dprdro.as_ref()
    }

    /// Evaluate `quantity` at linear density `ro` and entropy `se`.
    pub fn eval(&self, ro: f64, se: f64, quantity: EosQuantity) -> Result<f64> {
        Ok(self.eval_log(ro.ln(), se, quantity)?.exp())
    }

    /// Interpolated natural log of `quantity` at `(log_ro, se)`.
    pub fn eval_log(&self, log_ro: f64, se: f64, quantity: EosQuantity) -> Result<f64> {
        let i = bracket(&self.log_ro, self.dlog_ro, log_ro, "ro")?;
        let j = bracket(&self.se, self.dse, se, "se")?;

        let wx = (log_ro - self.log_ro[i]) / (self.log_ro[i + 1] - self.log_ro[i]);
        let wy = (se - self.se[j]) / (self.se[j + 1] - self.se[j]);
        let t = self.log_table(quantity);

        Ok(t[[i, j]] * (1.0 - wx) * (1.0 - wy)
            + t[[i + 1, j]] * wx * (1.0 - wy)
            + t[[i, j + 1]] * (1.0 - wx) * wy
            + t[[i + 1, j + 1]] * wx * wy)
    }

    /// Element-wise [`EosTable::eval`] over arrays of equal shape.
    pub fn eval_array<D: Dimension>(
        &self,
        ro: ArrayView<'_, f64, D>,
        se: ArrayView<'_, f64, D>,
        quantity: EosQuantity,
    ) -> Result<Array<f64, D>> {
        if ro.shape() != se.shape() {
            return Err(ReaderError::invalid_region(format!(
                "density shape {:?} differs from entropy shape {:?}",
                ro.shape(),
                se.shape()
            )));
        }

        let mut out = Array::zeros(ro.raw_dim());
        let mut failure = None;
        Zip::from(&mut out).and(&ro).and(&se).for_each(|o, &r, &s| {
            if failure.is_some() {
                return;
            }
            match self.eval(r, s, quantity) {
                Ok(v) => *o = v,
                Err(e) => failure = Some(e),
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }
}

/// Lower node index of the cell containing `value`.
///
/// The index is first estimated from the nominal spacing and then corrected
/// against the axis nodes so that non-uniform axes still bracket correctly.
fn bracket(axis: &Array1<f64>, step: f64, value: f64, name: &'static str) -> Result<usize> {
    let n = axis.len();
    let (min, max) = (axis[0], axis[n - 1]);
    if !(value >= min && value <= max) {
        return Err(ReaderError::EosOutOfRange {
            axis: name,
            value,
            min,
            max,
        });
    }

    let estimate = ((value - min) / step).floor();
    let mut i = (estimate.max(0.0) as usize).min(n - 2);
    while i > 0 && value < axis[i] {
        i -= 1;
    }
    while i < n - 2 && value > axis[i + 1] {
        i += 1;
    }
    Ok(i)
}

fn read_npz_array<D: Dimension>(
    npz: &mut NpzReader<File>,
    path: &Path,
    name: &str,
) -> Result<Array<f64, D>> {
    let with_suffix = format!("{}.npy", name);
    npz.by_name(&with_suffix)
        .or_else(|_| npz.by_name(name))
        .map_err(|e| ReaderError::malformed(path, format!("array '{}': {}", name, e)))
}
