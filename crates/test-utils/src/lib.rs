//! Shared test utilities for the stmap workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Temporary asset trees with Zarr rasters and YAML metadata cascades
//! - Band value generators with predictable patterns
//! - Approximate equality macros
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then build a data root in a test:
//!
//! ```ignore
//! use test_utils::{AssetTree, ramp_band, geographic_grid};
//!
//! let tree = AssetTree::new();
//! tree.add_raster("ndvi/default", &geographic_grid(8, 4, Some(-9999.0)), &[ramp_band(8, 4, 1)]);
//! tree.add_yaml("ndvi/default.yaml", "band-dates:\n  1: 2000-01-01\n");
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Approximate equality of two bounding boxes given as
/// `(min_x, min_y, max_x, max_y)` tuples or anything with those fields.
///
/// ```ignore
/// assert_bounds_approx_eq!(bbox, (-10.0, -5.0, 10.0, 5.0), 1e-6);
/// ```
#[macro_export]
macro_rules! assert_bounds_approx_eq {
    ($bbox:expr, ($x0:expr, $y0:expr, $x1:expr, $y1:expr), $epsilon:expr) => {{
        let b = &$bbox;
        $crate::assert_approx_eq!(b.min_x, $x0, $epsilon);
        $crate::assert_approx_eq!(b.min_y, $y0, $epsilon);
        $crate::assert_approx_eq!(b.max_x, $x1, $epsilon);
        $crate::assert_approx_eq!(b.max_y, $y1, $epsilon);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bounds {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    }

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_bounds_approx_eq_passes() {
        let b = Bounds {
            min_x: 1.0,
            min_y: 2.0,
            max_x: 3.0,
            max_y: 4.00001,
        };
        assert_bounds_approx_eq!(b, (1.0, 2.0, 3.0, 4.0), 0.001);
    }
}
