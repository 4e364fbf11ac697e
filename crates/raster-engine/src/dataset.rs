//! The raster dataset abstraction and resampled window reads.

use rayon::prelude::*;
use tracing::trace;

use crate::error::{RasterError, Result};
use crate::sampling::SampleGrid;
use crate::types::{GeoTransform, PixelWindow, ResampleMethod};

/// Extra source pixels read around a window so kernels see their neighbours.
const KERNEL_MARGIN: i64 = 3;

/// A georeferenced multi-band raster.
///
/// Bands are numbered from 1. Implementations only have to provide
/// native-resolution reads of blocks that lie inside the raster; clipping,
/// fill and resampling are handled by the provided methods.
pub trait RasterDataset: Send + Sync {
    fn band_count(&self) -> usize;

    /// Raster width in pixels.
    fn width(&self) -> usize;

    /// Raster height in pixels.
    fn height(&self) -> usize;

    fn geo_transform(&self) -> GeoTransform;

    /// Spatial reference definition (usually WKT).
    fn projection(&self) -> &str;

    fn band_nodata(&self, band: usize) -> Option<f64>;

    /// Read a block at native resolution, row-major.
    ///
    /// The block `[x, x + w) × [y, y + h)` is always within the raster.
    fn read_native(&self, band: usize, x: usize, y: usize, w: usize, h: usize) -> Result<Vec<f64>>;

    /// Value written where nothing can be read.
    fn fill_value(&self, band: usize) -> f64 {
        self.band_nodata(band).unwrap_or(f64::NAN)
    }

    fn check_band(&self, band: usize) -> Result<()> {
        let count = self.band_count();
        if band == 0 || band > count {
            return Err(RasterError::InvalidBand { band, count });
        }
        Ok(())
    }

    /// Read a block that may extend past the raster edges.
    ///
    /// Only the part overlapping the raster is read; samples outside it
    /// are invalid.
    fn read_block(&self, band: usize, x0: i64, y0: i64, w: usize, h: usize) -> Result<SampleGrid> {
        self.read_block_with_nodata(band, x0, y0, w, h, self.band_nodata(band))
    }

    /// [`read_block`](Self::read_block) treating `nodata` as the invalid
    /// value instead of the band's own.
    fn read_block_with_nodata(
        &self,
        band: usize,
        x0: i64,
        y0: i64,
        w: usize,
        h: usize,
        nodata: Option<f64>,
    ) -> Result<SampleGrid> {
        self.check_band(band)?;

        let cx0 = x0.clamp(0, self.width() as i64);
        let cy0 = y0.clamp(0, self.height() as i64);
        let cx1 = x0.saturating_add(w as i64).clamp(0, self.width() as i64);
        let cy1 = y0.saturating_add(h as i64).clamp(0, self.height() as i64);

        if cx1 <= cx0 || cy1 <= cy0 {
            return Ok(SampleGrid::empty());
        }

        let (bw, bh) = ((cx1 - cx0) as usize, (cy1 - cy0) as usize);
        let values = self.read_native(band, cx0 as usize, cy0 as usize, bw, bh)?;
        Ok(SampleGrid::new(cx0, cy0, bw, bh, values, nodata))
    }
}

/// A raster held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemDataset {
    width: usize,
    height: usize,
    geo_transform: GeoTransform,
    projection: String,
    bands: Vec<Vec<f64>>,
    nodata: Vec<Option<f64>>,
}

impl MemDataset {
    pub fn new(
        width: usize,
        height: usize,
        geo_transform: GeoTransform,
        projection: impl Into<String>,
    ) -> Self {
        Self {
            width,
            height,
            geo_transform,
            projection: projection.into(),
            bands: Vec::new(),
            nodata: Vec::new(),
        }
    }

    /// Append a band of `width * height` row-major values.
    pub fn with_band(mut self, values: Vec<f64>, nodata: Option<f64>) -> Result<Self> {
        if values.len() != self.width * self.height {
            return Err(RasterError::invalid_metadata(format!(
                "band has {} values, expected {}x{}",
                values.len(),
                self.width,
                self.height
            )));
        }
        self.bands.push(values);
        self.nodata.push(nodata);
        Ok(self)
    }

    /// Copy every band of another dataset into memory.
    pub fn copy_of(ds: &dyn RasterDataset) -> Result<Self> {
        let mut mem = Self::new(ds.width(), ds.height(), ds.geo_transform(), ds.projection());
        for band in 1..=ds.band_count() {
            let values = ds.read_native(band, 0, 0, ds.width(), ds.height())?;
            mem = mem.with_band(values, ds.band_nodata(band))?;
        }
        Ok(mem)
    }
}

impl RasterDataset for MemDataset {
    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    fn projection(&self) -> &str {
        &self.projection
    }

    fn band_nodata(&self, band: usize) -> Option<f64> {
        self.nodata.get(band.checked_sub(1)?).copied().flatten()
    }

    fn read_native(&self, band: usize, x: usize, y: usize, w: usize, h: usize) -> Result<Vec<f64>> {
        self.check_band(band)?;
        let data = &self.bands[band - 1];
        let mut out = Vec::with_capacity(w * h);
        for row in y..y + h {
            let start = row * self.width + x;
            out.extend_from_slice(&data[start..start + w]);
        }
        Ok(out)
    }
}

/// Read a fractional source window resampled to `out_w × out_h`.
///
/// Output pixel `(i, j)` samples the source at
/// `(x_off + (i + 0.5) · width / out_w, y_off + (j + 0.5) · height / out_h)`.
/// Pixels that cannot be sampled (outside the raster, or only no-data
/// contributors) hold the band's fill value.
pub fn read_window(
    ds: &dyn RasterDataset,
    band: usize,
    window: PixelWindow,
    out_w: usize,
    out_h: usize,
    method: ResampleMethod,
) -> Result<Vec<f64>> {
    ds.check_band(band)?;
    if out_w == 0 || out_h == 0 {
        return Ok(Vec::new());
    }

    let fill = ds.fill_value(band);

    // Nothing within reach of the kernels; also rejects NaN offsets
    let margin = KERNEL_MARGIN as f64;
    let x_end = window.x_off + window.width;
    let y_end = window.y_off + window.height;
    let overlaps = window.x_off < ds.width() as f64 + margin
        && x_end > -margin
        && window.y_off < ds.height() as f64 + margin
        && y_end > -margin;
    if !overlaps {
        return Ok(vec![fill; out_w * out_h]);
    }

    // Whole-pixel window at native size needs no resampling
    let integral = window.x_off.fract() == 0.0
        && window.y_off.fract() == 0.0
        && window.width == out_w as f64
        && window.height == out_h as f64;
    if integral {
        let grid = ds.read_block(band, window.x_off as i64, window.y_off as i64, out_w, out_h)?;
        let (x0, y0) = (window.x_off as i64, window.y_off as i64);
        let mut out = vec![fill; out_w * out_h];
        for (j, row) in out.chunks_mut(out_w).enumerate() {
            for (i, v) in row.iter_mut().enumerate() {
                if let Some(s) = grid.get(x0 + i as i64, y0 + j as i64) {
                    *v = s;
                }
            }
        }
        return Ok(out);
    }

    let step_x = window.width / out_w as f64;
    let step_y = window.height / out_h as f64;

    let bx0 = block_edge(window.x_off.floor() - margin, ds.width());
    let by0 = block_edge(window.y_off.floor() - margin, ds.height());
    let bx1 = block_edge(x_end.ceil() + margin, ds.width());
    let by1 = block_edge(y_end.ceil() + margin, ds.height());
    if bx1 <= bx0 || by1 <= by0 {
        return Ok(vec![fill; out_w * out_h]);
    }
    let grid = ds.read_block(band, bx0, by0, (bx1 - bx0) as usize, (by1 - by0) as usize)?;

    trace!(
        band,
        out_w,
        out_h,
        method = %method,
        "resampling window"
    );

    let mut out = vec![fill; out_w * out_h];
    out.par_chunks_mut(out_w).enumerate().for_each(|(j, row)| {
        let sy = window.y_off + (j as f64 + 0.5) * step_y;
        for (i, v) in row.iter_mut().enumerate() {
            let sx = window.x_off + (i as f64 + 0.5) * step_x;
            if let Some(s) = grid.sample(method, sx, sy, (step_x, step_y)) {
                *v = s;
            }
        }
    });
    Ok(out)
}

/// Clamp a block edge to the raster extent widened by the kernel margin.
fn block_edge(v: f64, size: usize) -> i64 {
    let margin = KERNEL_MARGIN as f64;
    v.clamp(-margin, size as f64 + margin) as i64
}
