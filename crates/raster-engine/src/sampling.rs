//! Resampling kernels over a block of source pixels.
//!
//! Positions are continuous pixel coordinates: source pixel `i` covers
//! `[i, i + 1)` and its centre is at `i + 0.5`. Every method ignores invalid
//! (no-data or out of block) pixels and renormalises over the valid ones; a
//! position with no valid contributor samples as `None`.

use std::f64::consts::PI;

use crate::types::ResampleMethod;

/// True when `value` is a no-data sample.
///
/// NaN is always no-data. Comparison is also done at `f32` precision
/// because rasters are stored as `f32`.
#[inline]
pub fn is_nodata(value: f64, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return true;
    }
    match nodata {
        Some(nd) => value == nd || (value as f32) == (nd as f32),
        None => false,
    }
}

/// A block of source pixels positioned at `(x0, y0)` in the source raster.
#[derive(Debug, Clone)]
pub struct SampleGrid {
    x0: i64,
    y0: i64,
    width: usize,
    height: usize,
    values: Vec<f64>,
    valid: Vec<bool>,
}

impl SampleGrid {
    pub fn new(
        x0: i64,
        y0: i64,
        width: usize,
        height: usize,
        values: Vec<f64>,
        nodata: Option<f64>,
    ) -> Self {
        let valid = values.iter().map(|v| !is_nodata(*v, nodata)).collect();
        Self {
            x0,
            y0,
            width,
            height,
            values,
            valid,
        }
    }

    /// A grid with no pixels; every sample is invalid.
    pub fn empty() -> Self {
        Self::new(0, 0, 0, 0, Vec::new(), None)
    }

    /// Value of source pixel `(col, row)` if it is inside the block and valid.
    #[inline]
    pub fn get(&self, col: i64, row: i64) -> Option<f64> {
        let c = col.saturating_sub(self.x0);
        let r = row.saturating_sub(self.y0);
        if c < 0 || r < 0 || c >= self.width as i64 || r >= self.height as i64 {
            return None;
        }
        let idx = r as usize * self.width + c as usize;
        self.valid[idx].then(|| self.values[idx])
    }

    /// Sample at `(x, y)`. `footprint` is the destination pixel size in
    /// source pixels, used by the area methods.
    pub fn sample(
        &self,
        method: ResampleMethod,
        x: f64,
        y: f64,
        footprint: (f64, f64),
    ) -> Option<f64> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        match method {
            ResampleMethod::Nearest => self.get(x.floor() as i64, y.floor() as i64),
            ResampleMethod::Average => self.average(x, y, footprint),
            ResampleMethod::Mode => self.mode(x, y, footprint),
            ResampleMethod::Bilinear => self.convolve(x, y, 1, triangle),
            ResampleMethod::Cubic => self.convolve(x, y, 2, catmull_rom),
            ResampleMethod::CubicSpline => self.convolve(x, y, 2, cubic_b_spline),
            ResampleMethod::Gauss => self.convolve(x, y, 2, gaussian),
            ResampleMethod::Lanczos => self.convolve(x, y, 3, lanczos3),
        }
    }

    /// Whether a kernel of `radius` centred at `(cx, cy)` touches the block.
    fn within_reach(&self, cx: f64, cy: f64, radius: f64) -> bool {
        let (bx0, by0) = (self.x0 as f64, self.y0 as f64);
        cx >= bx0 - radius
            && cx <= bx0 + self.width as f64 + radius
            && cy >= by0 - radius
            && cy <= by0 + self.height as f64 + radius
    }

    /// Separable kernel over the `2·radius` pixels around `(x, y)`.
    fn convolve(&self, x: f64, y: f64, radius: i64, kernel: fn(f64) -> f64) -> Option<f64> {
        let cx = x - 0.5;
        let cy = y - 0.5;
        if !self.within_reach(cx, cy, radius as f64) {
            return None;
        }
        let ix = cx.floor() as i64;
        let iy = cy.floor() as i64;

        let mut sum = 0.0;
        let mut total = 0.0;
        for row in (iy - radius + 1)..=(iy + radius) {
            let wy = kernel(cy - row as f64);
            if wy == 0.0 {
                continue;
            }
            for col in (ix - radius + 1)..=(ix + radius) {
                let wx = kernel(cx - col as f64);
                if wx == 0.0 {
                    continue;
                }
                if let Some(v) = self.get(col, row) {
                    let w = wx * wy;
                    sum += w * v;
                    total += w;
                }
            }
        }

        (total.abs() > 1e-12).then(|| sum / total)
    }

    /// Pixels overlapping the footprint centred at `(x, y)`, with overlap area.
    fn footprint_cells(
        &self,
        x: f64,
        y: f64,
        footprint: (f64, f64),
    ) -> impl Iterator<Item = (f64, f64)> + '_ {
        let half_w = footprint.0.abs().max(1e-9) / 2.0;
        let half_h = footprint.1.abs().max(1e-9) / 2.0;
        let (x_min, x_max) = (x - half_w, x + half_w);
        let (y_min, y_max) = (y - half_h, y + half_h);

        // Only cells of the block can contribute
        let (bx0, by0) = (self.x0 as f64, self.y0 as f64);
        let (bx1, by1) = (bx0 + self.width as f64, by0 + self.height as f64);
        let cols = (x_min.floor().max(bx0) as i64)..(x_max.ceil().min(bx1) as i64);
        let rows = (y_min.floor().max(by0) as i64)..(y_max.ceil().min(by1) as i64);

        rows.flat_map(move |row| {
            let oy = (y_max.min(row as f64 + 1.0) - y_min.max(row as f64)).max(0.0);
            cols.clone().filter_map(move |col| {
                let ox = (x_max.min(col as f64 + 1.0) - x_min.max(col as f64)).max(0.0);
                let area = ox * oy;
                if area <= 0.0 {
                    return None;
                }
                self.get(col, row).map(|v| (v, area))
            })
        })
    }

    fn average(&self, x: f64, y: f64, footprint: (f64, f64)) -> Option<f64> {
        let (sum, total) = self
            .footprint_cells(x, y, footprint)
            .fold((0.0, 0.0), |(s, t), (v, a)| (s + v * a, t + a));
        (total > 0.0).then(|| sum / total)
    }

    fn mode(&self, x: f64, y: f64, footprint: (f64, f64)) -> Option<f64> {
        let mut counts: Vec<(f64, f64)> = Vec::new();
        for (v, area) in self.footprint_cells(x, y, footprint) {
            match counts.iter_mut().find(|(value, _)| *value == v) {
                Some(entry) => entry.1 += area,
                None => counts.push((v, area)),
            }
        }
        // First value seen wins ties
        counts
            .into_iter()
            .fold(None, |best: Option<(f64, f64)>, (v, a)| match best {
                Some((_, best_a)) if best_a >= a => best,
                _ => Some((v, a)),
            })
            .map(|(v, _)| v)
    }
}

fn triangle(t: f64) -> f64 {
    (1.0 - t.abs()).max(0.0)
}

/// Catmull-Rom (Keys, a = -0.5).
fn catmull_rom(t: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        1.5 * t * t * t - 2.5 * t * t + 1.0
    } else if t < 2.0 {
        -0.5 * t * t * t + 2.5 * t * t - 4.0 * t + 2.0
    } else {
        0.0
    }
}

fn cubic_b_spline(t: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        (4.0 - 6.0 * t * t + 3.0 * t * t * t) / 6.0
    } else if t < 2.0 {
        (2.0 - t).powi(3) / 6.0
    } else {
        0.0
    }
}

fn gaussian(t: f64) -> f64 {
    if t.abs() >= 2.0 {
        return 0.0;
    }
    (-2.0 * t * t).exp()
}

fn sinc(t: f64) -> f64 {
    if t.abs() < 1e-12 {
        1.0
    } else {
        let a = PI * t;
        a.sin() / a
    }
}

fn lanczos3(t: f64) -> f64 {
    if t.abs() >= 3.0 {
        return 0.0;
    }
    sinc(t) * sinc(t / 3.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_3x3() -> SampleGrid {
        #[rustfmt::skip]
        let values = vec![
            1.0, 2.0, 3.0,
            4.0, 5.0, 6.0,
            7.0, 8.0, 9.0,
        ];
        SampleGrid::new(0, 0, 3, 3, values, None)
    }

    #[test]
    fn test_far_samples_are_invalid() {
        let grid = grid_3x3();
        for method in [
            ResampleMethod::Nearest,
            ResampleMethod::Bilinear,
            ResampleMethod::Lanczos,
            ResampleMethod::Average,
        ] {
            assert_eq!(grid.sample(method, 9.2e18, 1.0, (1.0, 1.0)), None);
            assert_eq!(grid.sample(method, 1.0, -9.2e18, (1.0, 1.0)), None);
        }
    }

    #[test]
    fn test_huge_footprint_averages_the_block() {
        let grid = grid_3x3();
        let v = grid.sample(ResampleMethod::Average, 1.5, 1.5, (1e18, 1e18)).unwrap();
        assert!((v - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest() {
        let grid = grid_3x3();
        let fp = (1.0, 1.0);
        assert_eq!(grid.sample(ResampleMethod::Nearest, 0.5, 0.5, fp), Some(1.0));
        assert_eq!(grid.sample(ResampleMethod::Nearest, 1.99, 1.01, fp), Some(5.0));
        assert_eq!(grid.sample(ResampleMethod::Nearest, 3.5, 0.5, fp), None);
    }

    #[test]
    fn test_kernels_reproduce_pixel_centres() {
        let grid = grid_3x3();
        for method in [
            ResampleMethod::Bilinear,
            ResampleMethod::Cubic,
            ResampleMethod::Lanczos,
        ] {
            let v = grid.sample(method, 1.5, 1.5, (1.0, 1.0)).unwrap();
            assert!((v - 5.0).abs() < 1e-9, "{} gave {}", method, v);
        }
    }

    #[test]
    fn test_bilinear_midpoint() {
        let grid = grid_3x3();
        // Halfway between the centres of 1, 2, 4 and 5
        let v = grid.sample(ResampleMethod::Bilinear, 1.0, 1.0, (1.0, 1.0)).unwrap();
        assert!((v - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bilinear_skips_nodata() {
        let values = vec![1.0, -9999.0, 3.0, -9999.0];
        let grid = SampleGrid::new(0, 0, 2, 2, values, Some(-9999.0));
        let v = grid.sample(ResampleMethod::Bilinear, 1.0, 1.0, (1.0, 1.0)).unwrap();
        assert!((v - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_nodata_is_none() {
        let grid = SampleGrid::new(0, 0, 2, 1, vec![f64::NAN, -1.0], Some(-1.0));
        for method in ResampleMethod::ALL {
            assert_eq!(grid.sample(method, 1.0, 0.5, (2.0, 1.0)), None, "{}", method);
        }
    }

    #[test]
    fn test_average_weights_by_overlap() {
        let grid = grid_3x3();
        // Footprint covering the whole grid
        let v = grid.sample(ResampleMethod::Average, 1.5, 1.5, (3.0, 3.0)).unwrap();
        assert!((v - 5.0).abs() < 1e-12);
        // Footprint over columns 0..1.5 of the first row: 1 * 1.0 + 2 * 0.5
        let v = grid.sample(ResampleMethod::Average, 0.75, 0.5, (1.5, 1.0)).unwrap();
        assert!((v - 2.0 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_mode_prefers_most_common() {
        let values = vec![3.0, 7.0, 7.0, 3.0, 7.0, 1.0];
        let grid = SampleGrid::new(0, 0, 3, 2, values, None);
        let v = grid.sample(ResampleMethod::Mode, 1.5, 1.0, (3.0, 2.0)).unwrap();
        assert_eq!(v, 7.0);
    }

    #[test]
    fn test_offset_grid() {
        let grid = SampleGrid::new(10, 20, 1, 1, vec![42.0], None);
        assert_eq!(grid.get(10, 20), Some(42.0));
        assert_eq!(grid.get(0, 0), None);
    }
}
