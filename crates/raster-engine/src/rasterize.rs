//! Burning geometries onto a raster's pixel grid.
//!
//! The output grid is aligned with the raster: it spans every raster pixel
//! the geometry's bounds touch, clipped to the raster extent. A pixel is inside a polygon when its centre is,
//! by the even-odd rule; multi-polygons are the union of their parts.

use rayon::prelude::*;
use tracing::trace;

use crate::error::{RasterError, Result};
use crate::geometry::{Geometry, Ring};
use crate::types::GeoTransform;

/// Subpixels per pixel edge when measuring fractional coverage.
pub const COVERAGE_SUBDIVISIONS: usize = 16;

/// Largest block a polygon may be rasterized onto, after clipping.
pub const MAX_RASTERIZE_PIXELS: usize = 4096 * 4096;

/// What a rasterized pixel holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BurnMode {
    /// `value` inside the geometry, 0 outside.
    Burn(f64),
    /// Fraction of the pixel covered, in `[0, 1]`.
    Coverage,
}

/// A geometry burned onto a block of raster pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizedRegion {
    /// Row-major, `width * height` values.
    pub weights: Vec<f64>,
    pub width: usize,
    pub height: usize,
    /// Column of the block's first pixel in the raster.
    pub x_off: i64,
    /// Row of the block's first pixel in the raster.
    pub y_off: i64,
}

impl RasterizedRegion {
    #[inline]
    pub fn weight(&self, col: usize, row: usize) -> f64 {
        self.weights[row * self.width + col]
    }

    /// Number of pixels with non-zero weight.
    pub fn covered(&self) -> usize {
        self.weights.iter().filter(|w| **w > 0.0).count()
    }
}

/// Rasterize `geometry`, given in the raster's spatial reference, onto a
/// raster of `extent = (width, height)` pixels.
///
/// A polygon entirely off the raster yields a single uncovered pixel at the
/// nearest raster corner. Points are not clipped.
pub fn rasterize(
    geometry: &Geometry,
    gt: &GeoTransform,
    mode: BurnMode,
    extent: (usize, usize),
) -> Result<RasterizedRegion> {
    let inv = gt.inverse()?;
    let burn = match mode {
        BurnMode::Burn(v) => v,
        BurnMode::Coverage => 1.0,
    };

    if let Geometry::Point(x, y) = geometry {
        let (px, py) = inv.apply(*x, *y);
        if !px.is_finite() || !py.is_finite() {
            return Err(RasterError::invalid_geometry("point does not map to a pixel"));
        }
        return Ok(RasterizedRegion {
            weights: vec![burn],
            width: 1,
            height: 1,
            x_off: px.floor() as i64,
            y_off: py.floor() as i64,
        });
    }

    // Polygons in pixel space
    let polygons: Vec<Vec<Ring>> = geometry
        .polygons()
        .into_iter()
        .map(|rings| {
            rings
                .iter()
                .map(|ring| ring.iter().map(|(x, y)| inv.apply(*x, *y)).collect())
                .collect()
        })
        .collect();

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (px, py) in polygons.iter().flatten().flatten() {
        min_x = min_x.min(*px);
        min_y = min_y.min(*py);
        max_x = max_x.max(*px);
        max_y = max_y.max(*py);
    }
    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return Err(RasterError::invalid_geometry("geometry has no usable vertices"));
    }

    let (cols, rows) = (extent.0 as f64, extent.1 as f64);
    let x0 = min_x.floor().clamp(0.0, cols);
    let y0 = min_y.floor().clamp(0.0, rows);
    let x1 = (max_x.floor() + 1.0).clamp(0.0, cols);
    let y1 = (max_y.floor() + 1.0).clamp(0.0, rows);

    if x1 <= x0 || y1 <= y0 {
        trace!(min_x, min_y, max_x, max_y, "geometry misses the raster");
        return Ok(RasterizedRegion {
            weights: vec![0.0],
            width: 1,
            height: 1,
            x_off: x0.min(cols - 1.0).max(0.0) as i64,
            y_off: y0.min(rows - 1.0).max(0.0) as i64,
        });
    }

    let pixels = (x1 - x0) * (y1 - y0);
    if pixels > MAX_RASTERIZE_PIXELS as f64 {
        return Err(RasterError::RegionTooLarge {
            pixels: pixels as u64,
            limit: MAX_RASTERIZE_PIXELS,
        });
    }

    let x_off = x0 as i64;
    let y_off = y0 as i64;
    let width = (x1 - x0) as usize;
    let height = (y1 - y0) as usize;

    let factor = match mode {
        BurnMode::Burn(_) => 1,
        BurnMode::Coverage => COVERAGE_SUBDIVISIONS,
    };
    let samples = (factor * factor) as f64;

    trace!(width, height, x_off, y_off, factor, "rasterizing geometry");

    let mut weights = vec![0.0; width * height];
    weights
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out)| {
            let mut counts = vec![0u32; width];
            let mut fine = vec![false; width * factor];
            for sub in 0..factor {
                let y = (y_off + row as i64) as f64 + (sub as f64 + 0.5) / factor as f64;
                fine.iter_mut().for_each(|f| *f = false);
                for rings in &polygons {
                    mark_spans(rings, y, x_off as f64, factor, &mut fine);
                }
                for (i, inside) in fine.iter().enumerate() {
                    if *inside {
                        counts[i / factor] += 1;
                    }
                }
            }
            for (w, c) in out.iter_mut().zip(counts) {
                *w = match mode {
                    BurnMode::Burn(_) if c > 0 => burn,
                    BurnMode::Burn(_) => 0.0,
                    BurnMode::Coverage => c as f64 / samples,
                };
            }
        });

    Ok(RasterizedRegion {
        weights,
        width,
        height,
        x_off,
        y_off,
    })
}

/// Mark the sample columns of scanline `y` inside the polygon.
///
/// Sample `k` sits at `x_start + (k + 0.5) / factor`.
fn mark_spans(rings: &[Ring], y: f64, x_start: f64, factor: usize, fine: &mut [bool]) {
    let mut crossings: Vec<f64> = Vec::new();
    for ring in rings {
        let n = ring.len();
        if n < 3 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = ring[i];
            let (xj, yj) = ring[j];
            if (yi > y) != (yj > y) {
                crossings.push((xj - xi) * (y - yi) / (yj - yi) + xi);
            }
            j = i;
        }
    }
    crossings.sort_by(|a, b| a.total_cmp(b));

    let f = factor as f64;
    for pair in crossings.chunks_exact(2) {
        // First sample with centre >= a, first with centre >= b
        let start = ((pair[0] - x_start) * f - 0.5).ceil().max(0.0) as usize;
        let end = (((pair[1] - x_start) * f - 0.5).ceil().max(0.0) as usize).min(fine.len());
        for cell in fine.iter_mut().take(end).skip(start) {
            *cell = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: (usize, usize) = (10, 10);

    fn gt() -> GeoTransform {
        // 1 unit pixels, north-up, origin (0, 10)
        GeoTransform::new(0.0, 1.0, 10.0, -1.0)
    }

    #[test]
    fn test_square_burn() {
        let square = Geometry::parse("POLYGON((1 9, 3 9, 3 7, 1 7, 1 9))").unwrap();
        let r = rasterize(&square, &gt(), BurnMode::Burn(1.0), EXTENT).unwrap();
        assert_eq!((r.x_off, r.y_off), (1, 1));
        assert_eq!((r.width, r.height), (3, 3));
        assert_eq!(r.covered(), 4);
        assert_eq!(r.weight(0, 0), 1.0);
        assert_eq!(r.weight(2, 2), 0.0);
    }

    #[test]
    fn test_half_pixel_coverage() {
        let rect = Geometry::parse("POLYGON((0 10, 0.5 10, 0.5 9, 0 9, 0 10))").unwrap();
        let r = rasterize(&rect, &gt(), BurnMode::Coverage, EXTENT).unwrap();
        // The bottom edge lands exactly on row 1, which is included but empty
        assert_eq!((r.width, r.height), (1, 2));
        assert!((r.weights[0] - 0.5).abs() < 1e-12);
        assert_eq!(r.weights[1], 0.0);
    }

    #[test]
    fn test_coverage_in_unit_range() {
        let tri = Geometry::parse("POLYGON((0.3 9.8, 4.6 9.1, 2.2 5.4, 0.3 9.8))").unwrap();
        let r = rasterize(&tri, &gt(), BurnMode::Coverage, EXTENT).unwrap();
        assert!(r.weights.iter().all(|w| (0.0..=1.0).contains(w)));
        assert!(r.weights.iter().any(|w| *w == 1.0));
        assert!(r.weights.iter().any(|w| *w > 0.0 && *w < 1.0));
    }

    #[test]
    fn test_multipolygon_union() {
        let g = Geometry::parse(
            "MULTIPOLYGON(((0 10, 2 10, 2 8, 0 8, 0 10)), ((1 10, 3 10, 3 8, 1 8, 1 10)))",
        )
        .unwrap();
        let r = rasterize(&g, &gt(), BurnMode::Coverage, EXTENT).unwrap();
        assert_eq!(r.x_off, 0);
        // Overlap is counted once
        assert!(r.weights.iter().all(|w| *w <= 1.0));
        assert_eq!(r.weight(1, 0), 1.0);
    }

    #[test]
    fn test_point_burns_one_pixel() {
        let r = rasterize(&Geometry::Point(2.5, 6.2), &gt(), BurnMode::Burn(7.0), EXTENT).unwrap();
        assert_eq!((r.x_off, r.y_off, r.width, r.height), (2, 3, 1, 1));
        assert_eq!(r.weights, vec![7.0]);
    }

    #[test]
    fn test_polygon_larger_than_raster_is_clipped() {
        let huge = Geometry::parse("POLYGON((-1e6 1e6, 1e6 1e6, 1e6 -1e6, -1e6 -1e6, -1e6 1e6))")
            .unwrap();
        let r = rasterize(&huge, &gt(), BurnMode::Coverage, EXTENT).unwrap();
        assert_eq!((r.x_off, r.y_off, r.width, r.height), (0, 0, 10, 10));
        assert!(r.weights.iter().all(|w| *w == 1.0));
    }

    #[test]
    fn test_polygon_off_the_raster_is_uncovered() {
        let far = Geometry::parse("POLYGON((50 50, 60 50, 60 40, 50 40, 50 50))").unwrap();
        let r = rasterize(&far, &gt(), BurnMode::Burn(1.0), EXTENT).unwrap();
        assert_eq!((r.x_off, r.y_off, r.width, r.height), (9, 0, 1, 1));
        assert_eq!(r.covered(), 0);
    }

    #[test]
    fn test_region_pixel_budget() {
        let huge = Geometry::parse("POLYGON((0 10, 1e5 10, 1e5 -1e5, 0 -1e5, 0 10))").unwrap();
        let err = rasterize(&huge, &gt(), BurnMode::Burn(1.0), (100_000, 100_000)).unwrap_err();
        assert!(matches!(
            err,
            RasterError::RegionTooLarge { limit, .. } if limit == MAX_RASTERIZE_PIXELS
        ));
    }
}
