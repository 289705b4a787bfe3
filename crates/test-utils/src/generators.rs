//! Deterministic value generators for synthetic runs.
//!
//! Every product written by [`crate::SyntheticRun`] encodes its own indices
//! in the stored value, so a test can check that a reconstructed array holds
//! the right cell without keeping a copy of what was written.

/// Value of variable slot `var` at global cell `(i, j, k)` of a 3D fragment.
///
/// Computed as `step * 100000 + var * 1000 + i * 100 + j * 10 + k`.
/// Primary variables use slots `0..mtype`; the derived `pr te op` blocks
/// follow at `mtype`, `mtype + 1` and `mtype + 2`. Values are unique while
/// `i`, `j` and `k` stay below 10 and `var` below 100.
///
/// # Example
///
/// ```
/// use test_utils::field_value;
///
/// assert_eq!(field_value(0, 3, 2, 1, 5), 500321.0);
/// ```
pub fn field_value(var: usize, i: usize, j: usize, k: usize, step: u32) -> f32 {
    (step as usize * 100_000 + var * 1000 + i * 100 + j * 10 + k) as f32
}

/// Value of `quantity` at `level` and horizontal cell `(j, k)` of an
/// optical-depth surface.
///
/// `patch` is 0 for single-patch runs and Yin, 1 for Yang.
pub fn tau_value(step: u32, patch: usize, level: usize, quantity: usize, j: usize, k: usize) -> f32 {
    (patch * 1_000_000 + step as usize * 100_000 + level * 10_000 + quantity * 100 + j * 10 + k)
        as f32
}

/// Value of storage slot `slot` at plane cell `(a, b)` of an arbitrary slice.
pub fn slice_value(step: u32, patch: usize, slot: usize, a: usize, b: usize) -> f32 {
    (patch * 1_000_000 + step as usize * 10_000 + slot * 1000 + a * 10 + b) as f32
}

/// Value of on-the-fly quantity `q` (position in the catalogue) at `(a, b)`.
pub fn on_the_fly_value(step: u32, q: usize, a: usize, b: usize) -> f32 {
    (step as usize * 10_000 + q * 1000 + a * 10 + b) as f32
}

/// Simulation time recorded for `step`.
pub fn step_time(step: u32) -> f64 {
    step as f64 * 60.0
}

/// Ghost-inclusive cell centers of a uniform axis.
///
/// `n` cells span `range`; `ghost` extra cells continue the spacing on each
/// side.
///
/// # Example
///
/// ```
/// use test_utils::uniform_centers;
///
/// let x = uniform_centers((0.0, 4.0), 4, 1);
/// assert_eq!(x, vec![-0.5, 0.5, 1.5, 2.5, 3.5, 4.5]);
/// ```
pub fn uniform_centers(range: (f64, f64), n: usize, ghost: usize) -> Vec<f64> {
    let (min, max) = range;
    let dx = (max - min) / n as f64;
    (0..n + 2 * ghost)
        .map(|i| min + (i as f64 - ghost as f64 + 0.5) * dx)
        .collect()
}

/// Background profile number `p` at ghost-inclusive index `i`.
pub fn background_value(p: usize, i: usize) -> f64 {
    ((p + 1) * 1000 + i) as f64
}

/// Natural log of EOS quantity `q` (ordered `pr en te op`) at
/// `(log_ro, se)`.
///
/// The tables written by [`crate::SyntheticRun::write_eos`] are linear in
/// log space, so bilinear lookups reproduce this function exactly.
pub fn eos_log_value(q: usize, log_ro: f64, se: f64) -> f64 {
    let a = 0.5 + 0.25 * q as f64;
    let b = 0.1 * (q as f64 + 1.0);
    a * log_ro + b * se
}

/// Natural log of the `dprdro` table at `(log_ro, se)`.
pub fn eos_log_dprdro(log_ro: f64, se: f64) -> f64 {
    -0.5 * log_ro + 0.05 * se
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_encodes_indices() {
        assert_eq!(field_value(2, 7, 3, 1, 0), 2731.0);
        assert_eq!(field_value(0, 0, 0, 0, 5), 500000.0);
        assert_ne!(field_value(1, 0, 0, 0, 0), field_value(0, 0, 0, 0, 1));
    }

    #[test]
    fn test_uniform_centers() {
        let x = uniform_centers((-1.0, 1.0), 4, 2);
        assert_eq!(x.len(), 8);
        assert!((x[2] + 0.75).abs() < 1e-12);
        assert!((x[5] - 0.75).abs() < 1e-12);
        assert!((x[0] + 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_tau_value_separates_patches() {
        assert!(tau_value(1, 1, 0, 0, 0, 0) > tau_value(1, 0, 2, 12, 9, 9));
    }

    #[test]
    fn test_eos_log_value_is_linear() {
        let mid = eos_log_value(2, -3.0, 1.5);
        let lo = eos_log_value(2, -4.0, 1.0);
        let hi = eos_log_value(2, -2.0, 2.0);
        assert!((mid - 0.5 * (lo + hi)).abs() < 1e-12);
    }
}
