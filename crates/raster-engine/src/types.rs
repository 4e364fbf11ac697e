//! Core types for raster access.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RasterError, Result};

/// Affine mapping between pixel and world coordinates.
///
/// Field order follows the usual six-number convention: a pixel at
/// column `px`, row `py` sits at
///
/// ```text
/// x = origin_x + px * pixel_width + py * row_rotation
/// y = origin_y + px * col_rotation + py * pixel_height
/// ```
///
/// North-up rasters have zero rotations and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// A transform without rotation.
    pub fn new(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    pub fn from_array(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    fn linear(&self) -> Matrix2<f64> {
        Matrix2::new(
            self.pixel_width,
            self.row_rotation,
            self.col_rotation,
            self.pixel_height,
        )
    }

    /// World coordinates of a (fractional) pixel position.
    #[inline]
    pub fn pixel_to_world(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.origin_x + px * self.pixel_width + py * self.row_rotation,
            self.origin_y + px * self.col_rotation + py * self.pixel_height,
        )
    }

    /// Precompute the world-to-pixel mapping.
    pub fn inverse(&self) -> Result<WorldToPixel> {
        let inv = self.linear().try_inverse().ok_or_else(|| {
            RasterError::invalid_metadata(format!("geotransform is not invertible: {:?}", self))
        })?;
        Ok(WorldToPixel {
            inv,
            origin: Vector2::new(self.origin_x, self.origin_y),
        })
    }

    /// Integer pixel containing a world point.
    pub fn pixel_of(&self, x: f64, y: f64) -> Result<(i64, i64)> {
        let (px, py) = self.inverse()?.apply(x, y);
        Ok((px.floor() as i64, py.floor() as i64))
    }

    /// A transform with the same origin and pixels `factor` times smaller.
    pub fn subdivided(&self, factor: f64) -> Self {
        Self {
            pixel_width: self.pixel_width / factor,
            row_rotation: self.row_rotation / factor,
            col_rotation: self.col_rotation / factor,
            pixel_height: self.pixel_height / factor,
            ..*self
        }
    }

    /// The transform of the sub-grid starting at pixel `(x_off, y_off)`.
    pub fn shifted(&self, x_off: f64, y_off: f64) -> Self {
        let (origin_x, origin_y) = self.pixel_to_world(x_off, y_off);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }
}

/// Inverse of a [`GeoTransform`].
#[derive(Debug, Clone, Copy)]
pub struct WorldToPixel {
    inv: Matrix2<f64>,
    origin: Vector2<f64>,
}

impl WorldToPixel {
    /// Fractional pixel position of a world point.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.inv * (Vector2::new(x, y) - self.origin);
        (p.x, p.y)
    }
}

/// A fractional source window in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelWindow {
    pub x_off: f64,
    pub y_off: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelWindow {
    pub fn new(x_off: f64, y_off: f64, width: f64, height: f64) -> Self {
        Self {
            x_off,
            y_off,
            width,
            height,
        }
    }
}

/// Resampling algorithm used when reading at a resolution other than native.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleMethod {
    /// Area-weighted mean of the covered source pixels
    Average,
    /// Bilinear interpolation (2x2 neighborhood)
    Bilinear,
    /// Catmull-Rom bicubic interpolation (4x4 neighborhood)
    Cubic,
    /// Cubic B-spline approximation (4x4 neighborhood)
    CubicSpline,
    /// Gaussian weighted neighborhood
    Gauss,
    /// Lanczos windowed sinc (6x6 neighborhood)
    Lanczos,
    /// Most frequent covered source value
    Mode,
    /// Nearest neighbor
    #[default]
    Nearest,
}

impl ResampleMethod {
    pub const ALL: [ResampleMethod; 8] = [
        ResampleMethod::Average,
        ResampleMethod::Bilinear,
        ResampleMethod::Cubic,
        ResampleMethod::CubicSpline,
        ResampleMethod::Gauss,
        ResampleMethod::Lanczos,
        ResampleMethod::Mode,
        ResampleMethod::Nearest,
    ];

    /// Look up a method by name (case-insensitive). Unknown names give `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResampleMethod::Average => "average",
            ResampleMethod::Bilinear => "bilinear",
            ResampleMethod::Cubic => "cubic",
            ResampleMethod::CubicSpline => "cubicspline",
            ResampleMethod::Gauss => "gauss",
            ResampleMethod::Lanczos => "lanczos",
            ResampleMethod::Mode => "mode",
            ResampleMethod::Nearest => "nearest",
        }
    }

    /// Methods that aggregate over the destination pixel's footprint rather
    /// than sampling a kernel at its centre.
    pub fn uses_footprint(&self) -> bool {
        matches!(self, ResampleMethod::Average | ResampleMethod::Mode)
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_method_names() {
        for method in ResampleMethod::ALL {
            assert_eq!(ResampleMethod::from_name(method.as_str()), Some(method));
        }
        assert_eq!(
            ResampleMethod::from_name("BiLinear"),
            Some(ResampleMethod::Bilinear)
        );
        assert_eq!(ResampleMethod::from_name("sinc"), None);
    }

    #[test]
    fn test_geotransform_round_trip() {
        let gt = GeoTransform::new(-180.0, 0.5, 90.0, -0.5);
        let inv = gt.inverse().unwrap();
        let (x, y) = gt.pixel_to_world(10.25, 20.75);
        let (px, py) = inv.apply(x, y);
        assert!((px - 10.25).abs() < 1e-9);
        assert!((py - 20.75).abs() < 1e-9);
    }

    #[test]
    fn test_rotated_geotransform_round_trip() {
        let gt = GeoTransform::from_array([100.0, 2.0, 0.5, 50.0, 0.25, -2.0]);
        let inv = gt.inverse().unwrap();
        let (x, y) = gt.pixel_to_world(3.0, 7.0);
        let (px, py) = inv.apply(x, y);
        assert!((px - 3.0).abs() < 1e-9);
        assert!((py - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_geotransform() {
        let gt = GeoTransform::new(0.0, 0.0, 0.0, -1.0);
        assert!(gt.inverse().is_err());
    }

    #[test]
    fn test_pixel_of_negative_offsets_floor() {
        let gt = GeoTransform::new(0.0, 1.0, 0.0, -1.0);
        assert_eq!(gt.pixel_of(-0.5, 0.5).unwrap(), (-1, -1));
        assert_eq!(gt.pixel_of(2.5, -3.5).unwrap(), (2, 3));
    }

    #[test]
    fn test_shifted_and_subdivided() {
        let gt = GeoTransform::new(10.0, 2.0, 20.0, -2.0);
        let sub = gt.shifted(3.0, 4.0).subdivided(16.0);
        assert_eq!(sub.pixel_to_world(0.0, 0.0), (16.0, 12.0));
        assert_eq!(sub.pixel_width, 0.125);
    }
}
