//! Provenance log (`cont_log.txt`) of a regridded run.
//!
//! The seventh line names the source data directory; readers of the new run
//! take the source case name from it.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use r2d2_reader::params::ParamValue;
use r2d2_reader::{Geometry, RunMetadata};

use crate::config::RegridRequest;

/// Grid parameters compared between the source and the regridded run.
#[derive(Debug, Clone, PartialEq)]
pub struct GridParameters {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
    pub ix: usize,
    pub jx: usize,
    pub kx: usize,
    pub ununiform: bool,
    /// Fine cells and spacing of a stretched first axis, when recorded.
    pub ix_ununi: Option<i64>,
    pub dx00: Option<f64>,
}

impl GridParameters {
    /// Parameters of the source run.
    pub fn from_metadata(metadata: &RunMetadata) -> Self {
        let params = metadata.params();
        let grid = metadata.grid();
        let double = |key: &str| params.double(key).unwrap_or(f64::NAN);
        Self {
            xmin: double("xmin"),
            xmax: double("xmax"),
            ymin: double("ymin"),
            ymax: double("ymax"),
            zmin: double("zmin"),
            zmax: double("zmax"),
            ix: grid.ix,
            jx: grid.jx,
            kx: grid.kx,
            ununiform: matches!(
                params.get("ununiform_flag"),
                Some(ParamValue::Bool(true))
            ),
            ix_ununi: params.int("ix_ununi").ok(),
            dx00: params.double("dx00").ok(),
        }
    }

    /// Parameters a request produces.
    pub fn from_request(request: &RegridRequest) -> Self {
        Self {
            xmin: request.x.min,
            xmax: request.x.max,
            ymin: request.y.min,
            ymax: request.y.max,
            zmin: request.z.min,
            zmax: request.z.max,
            ix: request.x.cells,
            jx: request.y.cells,
            kx: request.z.cells,
            ununiform: request.stretch.is_some(),
            ix_ununi: request.stretch.map(|s| s.fine_cells as i64),
            dx00: request.stretch.map(|s| s.fine_spacing),
        }
    }
}

fn marker(changed: bool) -> &'static str {
    if changed {
        " (changed)"
    } else {
        " (unchange)"
    }
}

fn optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

/// Builds the text of `cont_log.txt`.
#[derive(Debug, Clone)]
pub struct ProvenanceLog {
    server: String,
    source_datadir: String,
    step_label: String,
    geometry: Geometry,
    rstar: f64,
    old: GridParameters,
    new: GridParameters,
    created: DateTime<Utc>,
}

impl ProvenanceLog {
    pub fn new(metadata: &RunMetadata, step_label: impl Into<String>, request: &RegridRequest) -> Self {
        Self {
            server: metadata
                .params()
                .string("server")
                .unwrap_or("unknown")
                .to_string(),
            source_datadir: datadir_label(metadata.datadir()),
            step_label: step_label.into(),
            geometry: metadata.grid().geometry,
            rstar: metadata.rstar(),
            old: GridParameters::from_metadata(metadata),
            new: GridParameters::from_request(request),
            created: Utc::now(),
        }
    }

    /// Fix the creation time stamp.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Write the parameters `p`; markers compare the source with the target.
    fn write_block(&self, out: &mut String, p: &GridParameters) {
        let (old, new) = (&self.old, &self.new);
        for (name, value, changed) in [
            ("xmin", p.xmin, old.xmin != new.xmin),
            ("xmax", p.xmax, old.xmax != new.xmax),
        ] {
            let offset = value - self.rstar;
            let sign = if offset >= 0.0 { '+' } else { '-' };
            let _ = writeln!(
                out,
                "{} = rstar {}{:.4e} or {:.3}*rstar{}",
                name,
                sign,
                offset.abs(),
                value / self.rstar,
                marker(changed)
            );
        }

        let angular = matches!(self.geometry, Geometry::Spherical | Geometry::YinYang);
        for (name, value, changed) in [
            ("ymin", p.ymin, old.ymin != new.ymin),
            ("ymax", p.ymax, old.ymax != new.ymax),
            ("zmin", p.zmin, old.zmin != new.zmin),
            ("zmax", p.zmax, old.zmax != new.zmax),
        ] {
            if angular {
                let _ = writeln!(out, "{} = {:.4e} [deg]{}", name, value.to_degrees(), marker(changed));
            } else {
                let _ = writeln!(out, "{} = {:.4e}{}", name, value, marker(changed));
            }
        }
        out.push('\n');

        for (name, value, changed) in [
            ("nx0*ix0", p.ix, old.ix != new.ix),
            ("ny0*jx0", p.jx, old.jx != new.jx),
            ("nz0*kx0", p.kx, old.kx != new.kx),
        ] {
            let _ = writeln!(out, "{} = {}{}", name, value, marker(changed));
        }
        let _ = writeln!(
            out,
            "uniform_flag = {}{}",
            p.ununiform,
            marker(old.ununiform != new.ununiform)
        );
        let _ = writeln!(
            out,
            "ix_ununi = {}{}",
            optional(p.ix_ununi),
            marker(old.ix_ununi != new.ix_ununi)
        );
        let _ = writeln!(
            out,
            "dx00 = {}{}",
            optional(p.dx00.map(|v| format!("{:.4e}", v))),
            marker(old.dx00 != new.dx00)
        );
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("The initial condition of this run is regridded data from another run\n");
        out.push_str("This file describes the original and the regridded data\n\n");
        out.push_str("### Original data ###\n\n");
        let _ = writeln!(out, "Server: {}", self.server);
        let _ = writeln!(out, "Datadir: {}", self.source_datadir);
        let _ = writeln!(out, "Output step: {}", self.step_label);
        let _ = writeln!(out, "Created: {}", self.created.to_rfc3339());
        out.push('\n');

        self.write_block(&mut out, &self.old);

        out.push('\n');
        for _ in 0..3 {
            out.push_str("###############################################\n");
        }
        out.push_str("### Regridded data ###\n\n");
        self.write_block(&mut out, &self.new);
        out
    }
}

/// Data directory as written in the log, with a trailing separator.
fn datadir_label(datadir: &Path) -> String {
    let text = datadir.display().to_string();
    if text.ends_with('/') {
        text
    } else {
        text + "/"
    }
}
