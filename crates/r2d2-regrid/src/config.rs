//! Regrid request configuration.
//!
//! A request is usually kept next to the run as YAML:
//!
//! ```yaml
//! destination: /work/runs/d002
//! step: 12            # omit for the final rolling checkpoint
//! x: { min: -2.0e8, max: 6.9e8, cells: 256 }
//! y: { min: 0.0, max: 1.2e9, cells: 512 }
//! z: { min: 0.0, max: 1.2e9, cells: 512 }
//! stretch: { fine_cells: 32, fine_spacing: 4.8e6 }
//! byte_order: little
//! ```

use std::path::{Path, PathBuf};

use r2d2_reader::{ByteOrder, CheckpointSelector};
use serde::{Deserialize, Serialize};

use crate::coords::stretch_increment;
use crate::error::{RegridError, Result};

/// Bounds and interior cell count of one target axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub min: f64,
    pub max: f64,
    pub cells: usize,
}

impl AxisSpec {
    pub fn new(min: f64, max: f64, cells: usize) -> Self {
        Self { min, max, cells }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite()) {
            return Err(RegridError::invalid_grid(format!("{} bounds must be finite", name)));
        }
        if self.max <= self.min {
            return Err(RegridError::invalid_grid(format!(
                "{}: max {} must exceed min {}",
                name, self.max, self.min
            )));
        }
        if self.cells == 0 {
            return Err(RegridError::invalid_grid(format!("{} needs at least one cell", name)));
        }
        Ok(())
    }
}

/// Fine spacing concentrated at the top of the first axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopStretch {
    /// Cells of width `fine_spacing` below the upper boundary.
    pub fine_cells: usize,
    pub fine_spacing: f64,
}

/// Everything needed to regrid one checkpoint into a new run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegridRequest {
    /// Run directory to create; output goes to `<destination>/data`.
    pub destination: PathBuf,

    /// Checkpoint step; the final rolling checkpoint when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,

    pub x: AxisSpec,
    pub y: AxisSpec,
    pub z: AxisSpec,

    /// Top-concentrated stretching of the first axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stretch: Option<TopStretch>,

    #[serde(default)]
    pub byte_order: ByteOrder,

    /// Write one `qq{m:02}.dac.e` file per variable instead of `qq.dac.e`.
    #[serde(default)]
    pub split_variables: bool,

    /// Copy the source run directory, except `data/`, before writing.
    #[serde(default)]
    pub copy_skeleton: bool,
}

impl RegridRequest {
    /// Request with uniform axes and default output options.
    pub fn new(destination: impl Into<PathBuf>, x: AxisSpec, y: AxisSpec, z: AxisSpec) -> Self {
        Self {
            destination: destination.into(),
            step: None,
            x,
            y,
            z,
            stretch: None,
            byte_order: ByteOrder::default(),
            split_variables: false,
            copy_skeleton: false,
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| RegridError::Config(e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RegridError::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    /// Checkpoint the request reads.
    pub fn selector(&self) -> CheckpointSelector {
        match self.step {
            Some(n) => CheckpointSelector::Step(n),
            None => CheckpointSelector::Final,
        }
    }

    /// Check the request before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(RegridError::Config("destination must not be empty".to_string()));
        }
        self.x.validate("x")?;
        self.y.validate("y")?;
        self.z.validate("z")?;

        if let Some(stretch) = &self.stretch {
            stretch_increment(self.x.span(), self.x.cells, stretch.fine_cells, stretch.fine_spacing)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegridRequest {
        RegridRequest::new(
            "/work/runs/d002",
            AxisSpec::new(0.0, 8.0, 16),
            AxisSpec::new(0.0, 8.0, 16),
            AxisSpec::new(0.0, 3.0, 6),
        )
    }

    #[test]
    fn test_from_yaml_defaults() {
        let yaml = r#"
destination: /work/runs/d002
x: { min: 0.0, max: 8.0, cells: 16 }
y: { min: 0.0, max: 8.0, cells: 16 }
z: { min: 0.0, max: 3.0, cells: 6 }
"#;
        let parsed = RegridRequest::from_yaml_str(yaml).unwrap();
        assert_eq!(parsed, request());
        assert_eq!(parsed.selector(), CheckpointSelector::Final);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = r#"
destination: out
step: 12
x: { min: -2.0e8, max: 6.9e8, cells: 64 }
y: { min: 0.0, max: 1.0e9, cells: 8 }
z: { min: 0.0, max: 1.0e9, cells: 8 }
stretch: { fine_cells: 16, fine_spacing: 4.8e6 }
byte_order: big
split_variables: true
copy_skeleton: true
"#;
        let parsed = RegridRequest::from_yaml_str(yaml).unwrap();
        assert_eq!(parsed.selector(), CheckpointSelector::Step(12));
        assert_eq!(parsed.byte_order, ByteOrder::Big);
        assert_eq!(
            parsed.stretch,
            Some(TopStretch {
                fine_cells: 16,
                fine_spacing: 4.8e6
            })
        );
        assert!(parsed.split_variables && parsed.copy_skeleton);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_rejects_missing_axis() {
        let err = RegridRequest::from_yaml_str("destination: out\nx: { min: 0.0, max: 1.0, cells: 2 }\n")
            .unwrap_err();
        assert!(matches!(err, RegridError::Config(_)));
    }

    #[test]
    fn test_validate_axes() {
        let mut bad = request();
        bad.y = AxisSpec::new(1.0, 1.0, 4);
        assert!(matches!(bad.validate(), Err(RegridError::InvalidGridSpec(_))));

        let mut bad = request();
        bad.z.cells = 0;
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.x.max = f64::NAN;
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.destination = PathBuf::new();
        assert!(matches!(bad.validate(), Err(RegridError::Config(_))));
    }

    #[test]
    fn test_validate_stretch() {
        let mut req = request();
        req.stretch = Some(TopStretch {
            fine_cells: 4,
            fine_spacing: 0.25,
        });
        assert!(req.validate().is_ok());

        // fine cells alone would overshoot the span
        req.stretch = Some(TopStretch {
            fine_cells: 4,
            fine_spacing: 2.5,
        });
        assert!(matches!(req.validate(), Err(RegridError::InvalidGridSpec(_))));

        // no coarse cell left to absorb the span
        req.stretch = Some(TopStretch {
            fine_cells: 16,
            fine_spacing: 0.5,
        });
        assert!(req.validate().is_err());
    }
}
