//! Test support for the r2d2-tools workspace.
//!
//! - [`SyntheticRun`] writes a small run directory byte for byte the way the
//!   simulation lays it out, so readers can be exercised without real data.
//! - The generators give every stored value a closed form, so tests can
//!   predict what a reconstruction must return.
//! - Float assertions with an absolute tolerance.
//!
//! Pull it in as a dev-dependency (`test-utils = { path = "../test-utils" }`)
//! and write a run into a temporary directory:
//!
//! ```ignore
//! use test_utils::SyntheticRun;
//!
//! let tmp = tempfile::tempdir().unwrap();
//! let run = SyntheticRun::cartesian(2, 2, 1, 4, 4, 3);
//! let datadir = run.write(tmp.path()).unwrap();
//! run.write_fragments(&datadir, 5).unwrap();
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Assert `|left - right| <= eps`, comparing both sides as `f64`.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(0.1_f32 + 0.2_f32, 0.3, 1e-6);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $eps:expr) => {{
        let (actual, expected, eps) = ($actual as f64, $expected as f64, $eps as f64);
        if !((actual - expected).abs() <= eps) {
            panic!(
                "values differ by more than {:e}: actual {:?}, expected {:?} (off by {:e})",
                eps,
                actual,
                expected,
                (actual - expected).abs()
            );
        }
    }};
}

/// Element-wise [`assert_approx_eq!`] over two iterators of references.
///
/// ```ignore
/// use test_utils::assert_all_approx_eq;
///
/// assert_all_approx_eq!(a.iter(), b.iter(), 1e-6);
/// ```
#[macro_export]
macro_rules! assert_all_approx_eq {
    ($actual:expr, $expected:expr, $eps:expr) => {{
        let actual: Vec<f64> = $actual.into_iter().map(|v| *v as f64).collect();
        let expected: Vec<f64> = $expected.into_iter().map(|v| *v as f64).collect();
        assert_eq!(actual.len(), expected.len(), "length mismatch");
        for (idx, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
            if !((a - e).abs() <= $eps as f64) {
                panic!(
                    "values differ at element {}: actual {:?}, expected {:?} (tolerance {:e})",
                    idx, a, e, $eps as f64
                );
            }
        }
    }};
}
