//! Parsing of the run parameter table (`param/params.dac`) and step
//! counters (`param/nd.dac`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::{ReaderError, Result};

/// A typed value from `params.dac`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Double(f64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{:.4e}", v),
            Self::Str(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Key/value parameters of a run, each line `<value> <key> <type-tag>`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParamTable {
    values: BTreeMap<String, ParamValue>,
}

impl ParamTable {
    /// Read and parse `params.dac`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ReaderError::read_failed(path, e))?;
        Self::parse(&text).map_err(|msg| ReaderError::malformed(path, msg))
    }

    /// Parse the textual table.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut values = BTreeMap::new();

        for (lineno, line) in text.lines().enumerate() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }
            if parts.len() < 3 {
                return Err(format!("line {}: expected '<value> <key> <type>'", lineno + 1));
            }
            let (raw, key, tag) = (parts[0], parts[1], parts[2]);

            let value = match tag {
                "i" => raw
                    .parse::<i64>()
                    .map(ParamValue::Int)
                    .map_err(|e| format!("line {}: {}: {}", lineno + 1, key, e))?,
                "d" => parse_double(raw)
                    .map(ParamValue::Double)
                    .ok_or_else(|| format!("line {}: {}: invalid double '{}'", lineno + 1, key, raw))?,
                "c" => ParamValue::Str(raw.to_string()),
                "l" => ParamValue::Bool(raw != "F"),
                other => return Err(format!("line {}: unknown type tag '{}'", lineno + 1, other)),
            };
            values.insert(key.to_string(), value);
        }

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        match self.get(key) {
            Some(ParamValue::Int(v)) => Ok(*v),
            Some(_) => Err(ReaderError::ParameterType {
                key: key.to_string(),
                expected: "integer",
            }),
            None => Err(ReaderError::MissingParameter(key.to_string())),
        }
    }

    /// Integer parameter that must be non-negative.
    pub fn count(&self, key: &str) -> Result<usize> {
        let v = self.int(key)?;
        usize::try_from(v).map_err(|_| ReaderError::ParameterType {
            key: key.to_string(),
            expected: "non-negative integer",
        })
    }

    pub fn double(&self, key: &str) -> Result<f64> {
        match self.get(key) {
            Some(ParamValue::Double(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(_) => Err(ReaderError::ParameterType {
                key: key.to_string(),
                expected: "double",
            }),
            None => Err(ReaderError::MissingParameter(key.to_string())),
        }
    }

    pub fn string(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(ParamValue::Str(v)) => Ok(v.as_str()),
            Some(_) => Err(ReaderError::ParameterType {
                key: key.to_string(),
                expected: "string",
            }),
            None => Err(ReaderError::MissingParameter(key.to_string())),
        }
    }

    /// Double parameter with a fallback when absent.
    pub fn double_or(&self, key: &str, fallback: f64) -> Result<f64> {
        if self.contains(key) {
            self.double(key)
        } else {
            Ok(fallback)
        }
    }
}

/// Parse a Fortran-style double, accepting `D` exponents.
fn parse_double(raw: &str) -> Option<f64> {
    raw.replace(['D', 'd'], "e").parse::<f64>().ok()
}

/// Step counters from `param/nd.dac`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepCounters {
    /// Latest output step of the 3D products.
    pub nd: u32,
    /// Latest output step of the optical-depth products.
    pub nd_tau: u32,
}

impl StepCounters {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ReaderError::read_failed(path, e))?;
        Self::parse(&text).map_err(|msg| ReaderError::malformed(path, msg))
    }

    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut fields = text.split_whitespace();
        let mut next = |name: &str| -> std::result::Result<u32, String> {
            fields
                .next()
                .ok_or_else(|| format!("missing {}", name))?
                .parse::<u32>()
                .map_err(|e| format!("{}: {}", name, e))
        };
        let nd = next("nd")?;
        let nd_tau = next("nd_tau")?;
        Ok(Self { nd, nd_tau })
    }

    /// Raise `nd_tau` to the number of recorded optical-depth times when
    /// `time/tau/` holds more entries than the counter says.
    pub fn reconcile_tau(&mut self, tau_time_dir: &Path) {
        if !tau_time_dir.is_dir() {
            return;
        }
        let entries = walkdir::WalkDir::new(tau_time_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .count();
        if entries > 0 {
            self.nd_tau = self.nd_tau.max((entries - 1) as u32);
        }
    }
}
