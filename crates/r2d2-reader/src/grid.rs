//! Grid description: counts, ghost widths, geometry and coordinates.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ReaderError, Result};
use crate::layout::{read_file, ByteOrder, RecordReader};
use crate::params::ParamTable;

/// Coordinate system of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Geometry {
    Cartesian,
    Spherical,
    /// Two overlapping spherical patches (Yin and Yang).
    YinYang,
}

impl FromStr for Geometry {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Cartesian" => Ok(Self::Cartesian),
            "Spherical" => Ok(Self::Spherical),
            "YinYang" => Ok(Self::YinYang),
            other => Err(format!("unknown geometry '{}'", other)),
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cartesian => write!(f, "Cartesian"),
            Self::Spherical => write!(f, "Spherical"),
            Self::YinYang => write!(f, "YinYang"),
        }
    }
}

/// Whether the run is two- or three-dimensional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dimensionality {
    TwoD,
    ThreeD,
}

/// Per-patch coordinates of a Yin-Yang run, before the angular axes are
/// replaced by the merged spherical grid.
#[derive(Debug, Clone)]
pub struct YinYangPatch {
    pub jx: usize,
    pub kx: usize,
    pub jxg: usize,
    pub kxg: usize,
    /// Colatitude cell faces of one patch.
    pub y: Vec<f64>,
    /// Longitude cell faces of one patch.
    pub z: Vec<f64>,
    /// Ghost-inclusive colatitude cell centers of one patch.
    pub yg: Vec<f64>,
    /// Ghost-inclusive longitude cell centers of one patch.
    pub zg: Vec<f64>,
}

/// Counts and coordinates of the global grid.
#[derive(Debug, Clone)]
pub struct GridDescription {
    pub geometry: Geometry,
    pub dimensionality: Dimensionality,
    /// Margin parameter of the run.
    pub margin: usize,
    /// Ghost width per axis (`margin` where the axis carries ghosts, else 0).
    pub ghost: [usize; 3],
    pub ix: usize,
    pub jx: usize,
    pub kx: usize,
    pub ixg: usize,
    pub jxg: usize,
    pub kxg: usize,
    /// Cell centers without ghosts.
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    /// Cell centers including ghosts.
    pub xg: Vec<f64>,
    pub yg: Vec<f64>,
    pub zg: Vec<f64>,
    /// First-axis positions of the `ix + 1` cell faces.
    pub x_flux: Vec<f64>,
    /// First-axis centers normalised by the stellar radius.
    pub xr: Vec<f64>,
    pub yin_yang: Option<YinYangPatch>,
}

/// Counts derived from the parameter table, before coordinates are known.
#[derive(Debug, Clone, Copy)]
pub struct GridCounts {
    pub geometry: Geometry,
    pub dimensionality: Dimensionality,
    pub margin: usize,
    pub ghost: [usize; 3],
    pub ix: usize,
    pub jx: usize,
    pub kx: usize,
}

impl GridCounts {
    pub fn from_params(params: &ParamTable) -> Result<Self> {
        let geometry = params
            .string("geometry")?
            .parse::<Geometry>()
            .map_err(ReaderError::Config)?;

        let margin = params.count("margin")?;
        let ghost_of = |key: &str| -> Result<usize> {
            Ok(margin * params.count(key)?.saturating_sub(1))
        };
        let ghost = [ghost_of("xdcheck")?, ghost_of("ydcheck")?, ghost_of("zdcheck")?];

        let dimensionality = if params.int("zdcheck")? == 2 {
            Dimensionality::ThreeD
        } else {
            Dimensionality::TwoD
        };

        Ok(Self {
            geometry,
            dimensionality,
            margin,
            ghost,
            ix: params.count("ix0")? * params.count("nx")?,
            jx: params.count("jx0")? * params.count("ny")?,
            kx: params.count("kx0")? * params.count("nz")?,
        })
    }

    pub fn ixg(&self) -> usize {
        self.ix + 2 * self.ghost[0]
    }

    pub fn jxg(&self) -> usize {
        self.jx + 2 * self.ghost[1]
    }

    pub fn kxg(&self) -> usize {
        self.kx + 2 * self.ghost[2]
    }
}

/// Names of the first-axis background profiles in `back.dac`, in file order.
pub const BACKGROUND_FIELDS: [&str; 20] = [
    "pr0", "te0", "ro0", "se0", "en0", "op0", "tu0", "dsedr0", "dtedr0", "dprdro", "dprdse",
    "dtedro", "dtedse", "dendro", "dendse", "gx", "cp", "fa", "sa", "xi",
];

/// Background stratification from `param/back.dac`.
#[derive(Debug, Clone)]
pub struct Background {
    ghost: usize,
    profiles: BTreeMap<&'static str, Vec<f64>>,
}

impl Background {
    /// Ghost-inclusive profile.
    pub fn profile_with_ghosts(&self, name: &str) -> Option<&[f64]> {
        self.profiles.get(name).map(|v| v.as_slice())
    }

    /// Profile restricted to the non-ghost region.
    pub fn profile(&self, name: &str) -> Option<&[f64]> {
        self.profiles
            .get(name)
            .map(|v| &v[self.ghost..v.len() - self.ghost])
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.profiles.keys().copied()
    }
}

/// Read `back.dac` and build the grid description and background.
pub fn load_grid(
    path: &Path,
    counts: &GridCounts,
    order: ByteOrder,
    rstar: f64,
) -> Result<(GridDescription, Background)> {
    let buf = read_file(path)?;
    let mut reader = RecordReader::new(path, &buf, order);
    let (ixg, jxg, kxg) = (counts.ixg(), counts.jxg(), counts.kxg());

    let head = reader.i32()?;
    let xg = reader.f64s(ixg)?;
    let yg = reader.f64s(jxg)?;
    let zg = reader.f64s(kxg)?;
    let mut profiles = BTreeMap::new();
    for name in BACKGROUND_FIELDS {
        profiles.insert(name, reader.f64s(ixg)?);
    }
    let tail = reader.i32()?;
    if head != tail {
        return Err(ReaderError::malformed(
            path,
            format!("record markers differ: head {} tail {}", head, tail),
        ));
    }

    let [gx, gy, gz] = counts.ghost;
    let x = strip_ghosts(&xg, gx);
    let y = strip_ghosts(&yg, gy);
    let z = strip_ghosts(&zg, gz);
    let x_flux = flux_points(&xg, gx, counts.ix);
    let xr = x.iter().map(|v| v / rstar).collect();

    let mut grid = GridDescription {
        geometry: counts.geometry,
        dimensionality: counts.dimensionality,
        margin: counts.margin,
        ghost: counts.ghost,
        ix: counts.ix,
        jx: counts.jx,
        kx: counts.kx,
        ixg,
        jxg,
        kxg,
        x,
        y,
        z,
        xg,
        yg,
        zg,
        x_flux,
        xr,
        yin_yang: None,
    };

    if grid.geometry == Geometry::YinYang {
        grid.merge_yin_yang();
    }

    Ok((grid, Background { ghost: gx, profiles }))
}

impl GridDescription {
    /// Keep the per-patch coordinates and replace the angular axes by the
    /// merged grid covering the whole sphere at the same spacing.
    fn merge_yin_yang(&mut self) {
        let half_step = |c: &[f64]| if c.len() > 1 { 0.5 * (c[1] - c[0]) } else { 0.0 };
        let dy = half_step(&self.y);
        let dz = half_step(&self.z);

        self.yin_yang = Some(YinYangPatch {
            jx: self.jx,
            kx: self.kx,
            jxg: self.jx + 2 * self.margin,
            kxg: self.kx + 2 * self.margin,
            y: self.y.iter().map(|v| v - dy).collect(),
            z: self.z.iter().map(|v| v - dz).collect(),
            yg: self.yg.clone(),
            zg: self.zg.clone(),
        });

        self.jx *= 2;
        self.kx = 2 * self.jx;

        let dy = PI / self.jx as f64;
        let dz = 2.0 * PI / self.kx as f64;
        self.y = (0..self.jx).map(|j| (j as f64 + 0.5) * dy).collect();
        self.z = (0..self.kx).map(|k| (k as f64 + 0.5) * dz - PI).collect();
    }

    /// Index of the first-axis center nearest to `x`.
    pub fn nearest_x(&self, x: f64) -> usize {
        nearest_index(&self.x, x)
    }

    pub fn nearest_y(&self, y: f64) -> usize {
        nearest_index(&self.y, y)
    }

    pub fn nearest_z(&self, z: f64) -> usize {
        nearest_index(&self.z, z)
    }
}

fn strip_ghosts(values: &[f64], ghost: usize) -> Vec<f64> {
    values[ghost..values.len() - ghost].to_vec()
}

/// Face positions midway between consecutive ghost-inclusive centers. Without
/// ghost cells the outermost faces are extrapolated by half a cell.
fn flux_points(xg: &[f64], ghost: usize, ix: usize) -> Vec<f64> {
    if ghost > 0 {
        return (0..=ix)
            .map(|i| 0.5 * (xg[i + ghost] + xg[i + ghost - 1]))
            .collect();
    }
    if ix < 2 {
        return xg.to_vec();
    }
    let mut flux = Vec::with_capacity(ix + 1);
    flux.push(xg[0] - 0.5 * (xg[1] - xg[0]));
    for i in 1..ix {
        flux.push(0.5 * (xg[i] + xg[i - 1]));
    }
    flux.push(xg[ix - 1] + 0.5 * (xg[ix - 1] - xg[ix - 2]));
    flux
}

/// Index of the coordinate closest to `value`; the first one wins ties.
pub fn nearest_index(coords: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in coords.iter().enumerate() {
        let dist = (c - value).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_parse() {
        assert_eq!("YinYang".parse::<Geometry>().unwrap(), Geometry::YinYang);
        assert!("Cylindrical".parse::<Geometry>().is_err());
        assert_eq!(Geometry::Spherical.to_string(), "Spherical");
    }

    #[test]
    fn test_nearest_index() {
        let coords = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(nearest_index(&coords, -5.0), 0);
        assert_eq!(nearest_index(&coords, 1.4), 1);
        assert_eq!(nearest_index(&coords, 1.5), 1);
        assert_eq!(nearest_index(&coords, 9.0), 3);
    }

    #[test]
    fn test_flux_points_with_ghosts() {
        // centers at -1.5, -0.5, 0.5, 1.5, 2.5, 3.5 with one ghost per side
        let xg: Vec<f64> = (0..6).map(|i| i as f64 - 1.5).collect();
        let flux = flux_points(&xg, 1, 4);
        assert_eq!(flux, vec![-1.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_flux_points_without_ghosts() {
        let xg = vec![0.5, 1.5, 2.5];
        let flux = flux_points(&xg, 0, 3);
        assert_eq!(flux, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_merge_yin_yang_doubles_axes() {
        let mut grid = GridDescription {
            geometry: Geometry::YinYang,
            dimensionality: Dimensionality::ThreeD,
            margin: 1,
            ghost: [1, 1, 1],
            ix: 2,
            jx: 4,
            kx: 12,
            ixg: 4,
            jxg: 6,
            kxg: 14,
            x: vec![1.0, 2.0],
            y: vec![0.9, 1.1, 1.3, 1.5],
            z: (0..12).map(|k| k as f64 * 0.2 - 1.2).collect(),
            xg: vec![0.0, 1.0, 2.0, 3.0],
            yg: vec![0.7, 0.9, 1.1, 1.3, 1.5, 1.7],
            zg: (0..14).map(|k| k as f64 * 0.2 - 1.4).collect(),
            x_flux: vec![0.5, 1.5, 2.5],
            xr: vec![1.0, 2.0],
            yin_yang: None,
        };
        grid.merge_yin_yang();

        assert_eq!(grid.jx, 8);
        assert_eq!(grid.kx, 16);
        assert_eq!(grid.y.len(), 8);
        assert_eq!(grid.z.len(), 16);
        assert!((grid.y[0] - PI / 16.0).abs() < 1e-12);
        assert!((grid.z[0] - (PI / 16.0 - PI)).abs() < 1e-12);

        let patch = grid.yin_yang.as_ref().unwrap();
        assert_eq!((patch.jx, patch.kx, patch.jxg, patch.kxg), (4, 12, 6, 14));
        assert!((patch.y[0] - 0.8).abs() < 1e-12);
        assert_eq!(patch.yg.len(), 6);
    }
}
