//! Interpolation of 3D fields between rectilinear grids.

use ndarray::{Array3, ArrayView3, Zip};

use crate::error::{RegridError, Result};

/// Coordinates of a rectilinear grid, one ascending vector per axis.
#[derive(Debug, Clone, Copy)]
pub struct Axes<'a> {
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub z: &'a [f64],
}

impl<'a> Axes<'a> {
    pub fn new(x: &'a [f64], y: &'a [f64], z: &'a [f64]) -> Self {
        Self { x, y, z }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.x.len(), self.y.len(), self.z.len())
    }
}

/// Numeric service that moves a field from one grid onto another.
pub trait Interpolator3d: Send + Sync {
    /// Evaluate `values`, defined on `source`, at every point of `target`.
    fn interpolate(
        &self,
        source: Axes<'_>,
        values: ArrayView3<'_, f64>,
        target: Axes<'_>,
    ) -> Result<Array3<f64>>;
}

/// Lower source index and weight of the upper neighbour for one target
/// coordinate. Targets outside the source range take the boundary value.
fn stencil(source: &[f64], value: f64) -> (usize, f64) {
    let n = source.len();
    if n == 1 || value <= source[0] {
        return (0, 0.0);
    }
    if value >= source[n - 1] {
        return (n - 2, 1.0);
    }
    // first index with source[i] > value, minus one
    let i = source.partition_point(|&c| c <= value) - 1;
    let w = (value - source[i]) / (source[i + 1] - source[i]);
    (i, w)
}

fn check_axis(name: &str, coords: &[f64]) -> Result<()> {
    if coords.is_empty() {
        return Err(RegridError::invalid_grid(format!("{} axis is empty", name)));
    }
    if coords.windows(2).any(|p| !(p[1] > p[0])) {
        return Err(RegridError::invalid_grid(format!(
            "{} axis is not strictly ascending",
            name
        )));
    }
    Ok(())
}

/// Trilinear interpolation, parallel over target cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrilinearInterpolator;

impl TrilinearInterpolator {
    pub fn new() -> Self {
        Self
    }
}

impl Interpolator3d for TrilinearInterpolator {
    fn interpolate(
        &self,
        source: Axes<'_>,
        values: ArrayView3<'_, f64>,
        target: Axes<'_>,
    ) -> Result<Array3<f64>> {
        check_axis("source x", source.x)?;
        check_axis("source y", source.y)?;
        check_axis("source z", source.z)?;
        if values.dim() != source.shape() {
            return Err(RegridError::invalid_grid(format!(
                "field of shape {:?} does not match source axes {:?}",
                values.dim(),
                source.shape()
            )));
        }

        let sx: Vec<(usize, f64)> = target.x.iter().map(|&v| stencil(source.x, v)).collect();
        let sy: Vec<(usize, f64)> = target.y.iter().map(|&v| stencil(source.y, v)).collect();
        let sz: Vec<(usize, f64)> = target.z.iter().map(|&v| stencil(source.z, v)).collect();
        let (nx, ny, nz) = source.shape();

        let mut out = Array3::zeros(target.shape());
        Zip::indexed(&mut out).par_for_each(|(i, j, k), o| {
            let (i0, wx) = sx[i];
            let (j0, wy) = sy[j];
            let (k0, wz) = sz[k];
            let (i1, j1, k1) = ((i0 + 1).min(nx - 1), (j0 + 1).min(ny - 1), (k0 + 1).min(nz - 1));

            let c00 = values[[i0, j0, k0]] * (1.0 - wx) + values[[i1, j0, k0]] * wx;
            let c10 = values[[i0, j1, k0]] * (1.0 - wx) + values[[i1, j1, k0]] * wx;
            let c01 = values[[i0, j0, k1]] * (1.0 - wx) + values[[i1, j0, k1]] * wx;
            let c11 = values[[i0, j1, k1]] * (1.0 - wx) + values[[i1, j1, k1]] * wx;

            let c0 = c00 * (1.0 - wy) + c10 * wy;
            let c1 = c01 * (1.0 - wy) + c11 * wy;
            *o = c0 * (1.0 - wz) + c1 * wz;
        });

        tracing::debug!(
            source = ?source.shape(),
            target = ?target.shape(),
            "Interpolated field"
        );
        Ok(out)
    }
}
