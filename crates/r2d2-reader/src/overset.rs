//! Yin-Yang overset geometry.
//!
//! The Yang patch is the Yin patch rotated so that Cartesian `(x, y, z)`
//! becomes `(-x, z, y)`. Mapping a point twice returns the original point.

use std::f64::consts::PI;

use ndarray::{Array2, Zip};

use crate::grid::YinYangPatch;

/// Colatitude/longitude of a Yang-patch point expressed in Yin coordinates.
///
/// The same function maps Yin coordinates to Yang coordinates.
pub fn yang_to_yin(colat: f64, lon: f64) -> (f64, f64) {
    let colat_o = (colat.sin() * lon.sin()).acos();
    let mut lon_o = (colat.cos() / colat_o.sin()).clamp(-1.0, 1.0).asin();

    // asin only covers half the circle; use the sign of the x component
    let x = colat.sin() * lon.cos();
    let x_o = -colat_o.sin() * lon_o.cos();
    if x * x_o < 0.0 {
        lon_o = lon_o.signum() * PI - lon_o;
    }
    (colat_o, lon_o)
}

/// Meshgrids of one patch and their positions on the other patch.
///
/// Every array has shape `(colatitudes, longitudes)`.
#[derive(Debug, Clone)]
pub struct OversetGeometry {
    /// Colatitude mesh built from cell faces.
    pub colat: Array2<f64>,
    pub lon: Array2<f64>,
    /// Same mesh seen from the other patch.
    pub colat_other: Array2<f64>,
    pub lon_other: Array2<f64>,
    /// Ghost-inclusive meshes built from cell centers.
    pub colat_ghost: Array2<f64>,
    pub lon_ghost: Array2<f64>,
    pub colat_ghost_other: Array2<f64>,
    pub lon_ghost_other: Array2<f64>,
}

impl OversetGeometry {
    pub fn build(patch: &YinYangPatch) -> Self {
        let (colat, lon) = meshgrid(&patch.y, &patch.z);
        let (colat_other, lon_other) = transform(&colat, &lon);
        let (colat_ghost, lon_ghost) = meshgrid(&patch.yg, &patch.zg);
        let (colat_ghost_other, lon_ghost_other) = transform(&colat_ghost, &lon_ghost);

        tracing::debug!(
            faces = ?colat.dim(),
            ghost = ?colat_ghost.dim(),
            "Built Yin-Yang overset geometry"
        );

        Self {
            colat,
            lon,
            colat_other,
            lon_other,
            colat_ghost,
            lon_ghost,
            colat_ghost_other,
            lon_ghost_other,
        }
    }
}

fn meshgrid(colat: &[f64], lon: &[f64]) -> (Array2<f64>, Array2<f64>) {
    let shape = (colat.len(), lon.len());
    (
        Array2::from_shape_fn(shape, |(j, _)| colat[j]),
        Array2::from_shape_fn(shape, |(_, k)| lon[k]),
    )
}

fn transform(colat: &Array2<f64>, lon: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let mut colat_o = Array2::zeros(colat.raw_dim());
    let mut lon_o = Array2::zeros(colat.raw_dim());
    Zip::from(&mut colat_o)
        .and(&mut lon_o)
        .and(colat)
        .and(lon)
        .for_each(|co, lo, &c, &l| {
            let (c2, l2) = yang_to_yin(c, l);
            *co = c2;
            *lo = l2;
        });
    (colat_o, lon_o)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cartesian(colat: f64, lon: f64) -> [f64; 3] {
        [colat.sin() * lon.cos(), colat.sin() * lon.sin(), colat.cos()]
    }

    #[test]
    fn test_rotation_matches_cartesian_map() {
        for &(colat, lon) in &[(0.9, 0.3), (1.2, -0.7), (2.0, 2.5), (0.6, -2.9)] {
            let (c2, l2) = yang_to_yin(colat, lon);
            let [x, y, z] = cartesian(colat, lon);
            let [x2, y2, z2] = cartesian(c2, l2);
            assert!((x2 + x).abs() < 1e-12, "x for ({}, {})", colat, lon);
            assert!((y2 - z).abs() < 1e-12, "y for ({}, {})", colat, lon);
            assert!((z2 - y).abs() < 1e-12, "z for ({}, {})", colat, lon);
        }
    }

    #[test]
    fn test_involution() {
        for &(colat, lon) in &[(0.8, 0.1), (1.5, -1.0), (2.2, 0.75)] {
            let (c2, l2) = yang_to_yin(colat, lon);
            let (c3, l3) = yang_to_yin(c2, l2);
            assert!((c3 - colat).abs() < 1e-10);
            assert!((l3 - lon).abs() < 1e-10);
        }
    }

    fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
        a.iter().zip(&b).map(|(p, q)| (p - q).powi(2)).sum::<f64>().sqrt()
    }

    /// Points on the asin branch cut, the patch equator and the meridian.
    fn boundary_points() -> Vec<(f64, f64)> {
        let half = std::f64::consts::FRAC_PI_2;
        let mut points = vec![(half, 0.0), (0.7, 0.0), (2.4, 0.0), (half, half), (half, -half)];
        for &eps in &[1e-9, 1e-6, 1e-3] {
            for &lon in &[half + eps, half - eps, -half + eps, -half - eps] {
                for &colat in &[0.4, half, 2.7] {
                    points.push((colat, lon));
                }
            }
        }
        points
    }

    #[test]
    fn test_boundary_points_follow_rotation() {
        for (colat, lon) in boundary_points() {
            let (c2, l2) = yang_to_yin(colat, lon);
            assert!((0.0..=PI).contains(&c2), "colat for ({}, {})", colat, lon);
            assert!(l2.abs() <= PI + 1e-12, "lon for ({}, {})", colat, lon);

            let [x, y, z] = cartesian(colat, lon);
            let d = distance(cartesian(c2, l2), [-x, z, y]);
            assert!(d < 1e-6, "({}, {}) off by {:e}", colat, lon, d);
        }
    }

    #[test]
    fn test_boundary_points_round_trip() {
        for (colat, lon) in boundary_points() {
            let (c2, l2) = yang_to_yin(colat, lon);
            let (c3, l3) = yang_to_yin(c2, l2);
            let d = distance(cartesian(c3, l3), cartesian(colat, lon));
            assert!(d < 1e-6, "({}, {}) off by {:e}", colat, lon, d);
        }
    }

    #[test]
    fn test_equator_meridian_maps_to_far_side() {
        let (c2, l2) = yang_to_yin(std::f64::consts::FRAC_PI_2, 0.0);
        assert!((c2 - std::f64::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((l2.abs() - PI).abs() < 1e-6);
    }

    #[test]
    fn test_build_shapes() {
        let patch = YinYangPatch {
            jx: 3,
            kx: 4,
            jxg: 5,
            kxg: 6,
            y: vec![0.9, 1.2, 1.5],
            z: vec![-0.6, -0.2, 0.2, 0.6],
            yg: vec![0.6, 0.9, 1.2, 1.5, 1.8],
            zg: vec![-1.0, -0.6, -0.2, 0.2, 0.6, 1.0],
        };
        let geometry = OversetGeometry::build(&patch);
        assert_eq!(geometry.colat.dim(), (3, 4));
        assert_eq!(geometry.lon_other.dim(), (3, 4));
        assert_eq!(geometry.colat_ghost_other.dim(), (5, 6));
        assert_eq!(geometry.colat[[2, 0]], 1.5);
        assert_eq!(geometry.lon[[0, 3]], 0.6);
    }
}
