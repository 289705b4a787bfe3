//! Target coordinate generators.
//!
//! Both generators return ghost-inclusive cell centers: `n` interior cells
//! spanning `[min, max]` plus `ghost` cells on each side.

use crate::error::{RegridError, Result};

/// Uniformly spaced cell centers.
///
/// `dx = (max - min) / n`; the first ghost center sits at
/// `min - (ghost - 0.5) * dx`.
pub fn uniform(min: f64, max: f64, n: usize, ghost: usize) -> Vec<f64> {
    let dx = (max - min) / n as f64;
    let mut x = Vec::with_capacity(n + 2 * ghost);
    let mut current = min - (ghost as f64 - 0.5) * dx;
    for _ in 0..n + 2 * ghost {
        x.push(current);
        current += dx;
    }
    x
}

/// Width increment `f` of the coarse cells of a top-concentrated axis.
///
/// Cells are counted from the top: `fine_cells` cells of width `dx_fine`,
/// then `n - fine_cells` coarse cells where the `m`-th one below the fine
/// region is `dx_fine + m * f` wide. `f` is chosen so that all widths add up
/// to `span`.
///
/// The grid is rejected unless at least one coarse cell remains, the fine
/// region fits strictly inside the span, and the coarse cells are at least
/// as wide as the fine ones (`f >= 0`).
pub fn stretch_increment(span: f64, n: usize, fine_cells: usize, dx_fine: f64) -> Result<f64> {
    if !(dx_fine > 0.0 && dx_fine.is_finite()) {
        return Err(RegridError::invalid_grid(format!(
            "fine spacing must be positive, got {}",
            dx_fine
        )));
    }
    if fine_cells >= n {
        return Err(RegridError::invalid_grid(format!(
            "{} fine cells leave no coarse cell out of {}",
            fine_cells, n
        )));
    }
    let fine_span = fine_cells as f64 * dx_fine;
    if fine_span >= span {
        return Err(RegridError::invalid_grid(format!(
            "fine region of {:.4e} does not fit in span {:.4e}",
            fine_span, span
        )));
    }

    let coarse = (n - fine_cells) as f64;
    let f = 2.0 * (span - fine_span - coarse * dx_fine) / (coarse * (coarse + 1.0));
    if f < 0.0 {
        return Err(RegridError::invalid_grid(format!(
            "span {:.4e} is too small for {} cells of at least {:.4e}",
            span, n, dx_fine
        )));
    }
    Ok(f)
}

/// Cell centers with fine cells concentrated below `max`.
///
/// Interior faces cover `[min, max]` exactly (up to rounding). Ghost cells
/// continue the width of the adjacent boundary cell.
pub fn top_concentrated(
    min: f64,
    max: f64,
    n: usize,
    ghost: usize,
    fine_cells: usize,
    dx_fine: f64,
) -> Result<Vec<f64>> {
    let f = stretch_increment(max - min, n, fine_cells, dx_fine)?;
    let coarse = n - fine_cells;

    // widths from the bottom cell upwards
    let widths: Vec<f64> = (0..n)
        .map(|i| {
            if i < coarse {
                dx_fine + (coarse - i) as f64 * f
            } else {
                dx_fine
            }
        })
        .collect();

    let mut x = Vec::with_capacity(n + 2 * ghost);
    let bottom = widths[0];
    for g in (1..=ghost).rev() {
        x.push(min - (g as f64 - 0.5) * bottom);
    }
    let mut face = min;
    for w in &widths {
        x.push(face + 0.5 * w);
        face += w;
    }
    let top = widths[n - 1];
    for g in 1..=ghost {
        x.push(face + (g as f64 - 0.5) * top);
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_all_approx_eq, assert_approx_eq};

    #[test]
    fn test_uniform() {
        let x = uniform(0.0, 4.0, 4, 2);
        assert_all_approx_eq!(x.iter(), [-1.5, -0.5, 0.5, 1.5, 2.5, 3.5, 4.5, 5.5].iter(), 1e-12);

        let x = uniform(-1.0, 1.0, 5, 0);
        assert_eq!(x.len(), 5);
        assert_approx_eq!(x[2], 0.0, 1e-12);
    }

    #[test]
    fn test_top_concentrated_spans_domain() {
        let (min, max, n, fine, dx) = (-2.0e8, 6.9e8, 64, 16, 4.8e6);
        let x = top_concentrated(min, max, n, 2, fine, dx).unwrap();
        assert_eq!(x.len(), n + 4);

        // interior faces rebuilt from consecutive centers
        let widths: Vec<f64> = {
            let mut w = Vec::with_capacity(n);
            let mut face = min;
            for &c in &x[2..n + 2] {
                let width = 2.0 * (c - face);
                w.push(width);
                face += width;
            }
            assert_approx_eq!(face, max, 1e-6 * (max - min));
            w
        };

        // fine at the top, widening monotonically downwards
        for w in &widths[n - fine..] {
            assert_approx_eq!(*w, dx, 1e-6 * dx);
        }
        for pair in widths[..n - fine].windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert!(x.windows(2).all(|p| p[1] > p[0]));
    }

    #[test]
    fn test_top_concentrated_ghosts_follow_boundary_widths() {
        let x = top_concentrated(0.0, 10.0, 4, 1, 2, 1.0).unwrap();
        // n_coarse = 2, f = 2 * (10 - 2 - 2) / 6 = 2: widths 5, 3, 1, 1
        assert_all_approx_eq!(x.iter(), [-2.5, 2.5, 6.5, 8.5, 9.5, 10.5].iter(), 1e-12);
    }

    #[test]
    fn test_top_concentrated_degenerates_to_uniform() {
        // f = 0 when the span holds exactly n fine cells
        let x = top_concentrated(0.0, 4.0, 4, 1, 1, 1.0).unwrap();
        assert_all_approx_eq!(x.iter(), uniform(0.0, 4.0, 4, 1).iter(), 1e-12);
    }

    #[test]
    fn test_stretch_edge_policy() {
        assert!(stretch_increment(10.0, 4, 4, 1.0).is_err());
        assert!(stretch_increment(10.0, 4, 0, 1.0).is_ok());
        assert!(stretch_increment(3.0, 4, 3, 1.0).is_err());
        assert!(stretch_increment(3.5, 4, 2, 1.0).is_err());
        assert!(stretch_increment(10.0, 4, 2, 0.0).is_err());
        assert!(stretch_increment(10.0, 4, 2, f64::NAN).is_err());
    }
}
