//! Window and region extraction.
//!
//! Both entry points map geographic coordinates onto the asset's pixel
//! grid, read the selected bands and mask no-data. Windows are resampled
//! to a requested size; regions are read at native resolution together
//! with a weight mask of the pixels the region covers.

use ndarray::{Array2, Array3};
use raster_engine::{
    is_nodata, rasterize, read_window, BurnMode, Geometry, PixelWindow, RasterDataset, ResampleMethod,
};
use stmap_common::{BoundingBox, DateSelector, StmapError, StmapResult};
use tracing::{debug, instrument};

use crate::asset::Asset;
use crate::masked::{MaskedArray, WeightMask};
use crate::region::Region;

/// How a polygon region weighs the pixels it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coverage {
    /// Pixels whose centre is inside weigh 1.
    #[default]
    Binary,
    /// Pixels weigh the fraction of their area inside.
    Fractional,
}

impl Coverage {
    pub fn from_name(name: &str) -> StmapResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "" | "binary" => Ok(Self::Binary),
            "fractional" => Ok(Self::Fractional),
            other => Err(StmapError::invalid_parameter(
                "coverage",
                format!("expected 'binary' or 'fractional', got '{}'", other),
            )),
        }
    }

    fn burn_mode(self) -> BurnMode {
        match self {
            Coverage::Binary => BurnMode::Burn(1.0),
            Coverage::Fractional => BurnMode::Coverage,
        }
    }
}

/// Pixels read for a region and how much each one counts.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionData {
    pub data: MaskedArray,
    /// `[row, col]` weights; `None` for point regions, which weigh 1.
    pub weights: Option<WeightMask>,
}

/// Fractional pixel window covering `bounds` on a grid.
///
/// The corner read first depends on the sign of the pixel size, so both
/// north-up and flipped rasters map correctly.
pub fn window_for_bounds(ds: &dyn RasterDataset, bounds: &BoundingBox) -> StmapResult<PixelWindow> {
    let gt = ds.geo_transform();
    if gt.pixel_width == 0.0 || gt.pixel_height == 0.0 {
        return Err(StmapError::InvalidMetadata("raster has a zero pixel size".into()));
    }
    if !(bounds.width() > 0.0 && bounds.height() > 0.0) {
        return Err(StmapError::invalid_parameter(
            "window",
            "bounds must have a positive width and height",
        ));
    }

    let ul_x = if gt.pixel_width > 0.0 { bounds.min_x } else { bounds.max_x };
    let ul_y = if gt.pixel_height > 0.0 { bounds.min_y } else { bounds.max_y };

    Ok(PixelWindow::new(
        (ul_x - gt.origin_x) / gt.pixel_width,
        (ul_y - gt.origin_y) / gt.pixel_height,
        bounds.width() / gt.pixel_width.abs(),
        bounds.height() / gt.pixel_height.abs(),
    ))
}

fn stack(bands: Vec<Vec<f64>>, rows: usize, cols: usize) -> StmapResult<Array3<f64>> {
    let count = bands.len();
    Array3::from_shape_vec((count, rows, cols), bands.concat())
        .map_err(|e| StmapError::InternalError(format!("assembling bands: {}", e)))
}

impl Asset {
    /// Read `bounds` from the selected bands, resampled to
    /// `size = (width, height)`. The result is `[bands, height, width]`.
    ///
    /// Parts of the window outside the raster come back masked.
    #[instrument(level = "debug", skip(self), fields(asset = %self.name))]
    pub fn get_window(
        &self,
        bounds: &BoundingBox,
        selector: Option<&DateSelector>,
        size: (usize, usize),
        method: ResampleMethod,
    ) -> StmapResult<MaskedArray> {
        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(StmapError::invalid_parameter(
                "window_size",
                "width and height must be positive",
            ));
        }

        let ds = self.dataset();
        let bands = self.band_index.resolve(selector, ds.band_count())?;
        let window = window_for_bounds(ds, bounds)?;

        let mut values = Vec::with_capacity(bands.len());
        for &band in &bands {
            values.push(read_window(ds, band, window, width, height, method)?);
        }
        let data = stack(values, height, width)?;

        let mut mask = Array3::from_elem(data.dim(), false);
        for (i, &band) in bands.iter().enumerate() {
            let nodata = ds.band_nodata(band);
            mask.index_axis_mut(ndarray::Axis(0), i)
                .zip_mut_with(&data.index_axis(ndarray::Axis(0), i), |m, v| {
                    *m = is_nodata(*v, nodata)
                });
        }

        debug!(bands = bands.len(), width, height, resample = %method, "read window");
        MaskedArray::new(data, mask)
    }

    /// Read the pixels `region` covers at native resolution.
    ///
    /// A point reads the single pixel containing it. A polygon is
    /// rasterized onto the raster grid; pixels it does not cover are
    /// masked, as are band and asset no-data values.
    #[instrument(level = "debug", skip(self, region), fields(asset = %self.name))]
    pub fn get_region(
        &self,
        region: &Region,
        selector: Option<&DateSelector>,
        method: ResampleMethod,
        coverage: Coverage,
    ) -> StmapResult<RegionData> {
        let ds = self.dataset();
        let bands = self.band_index.resolve(selector, ds.band_count())?;
        let geometry = region.to_raster_space(ds.projection())?;

        let burned = rasterize(
            &geometry,
            &ds.geo_transform(),
            coverage.burn_mode(),
            (ds.width(), ds.height()),
        )?;
        let (width, height) = (burned.width, burned.height);
        let window = PixelWindow::new(
            burned.x_off as f64,
            burned.y_off as f64,
            width as f64,
            height as f64,
        );

        let weights = match geometry {
            Geometry::Point(..) => None,
            _ => Some(
                Array2::from_shape_vec((height, width), burned.weights)
                    .map_err(|e| StmapError::InternalError(format!("weight mask: {}", e)))?,
            ),
        };

        let mut values = Vec::with_capacity(bands.len());
        for &band in &bands {
            values.push(read_window(ds, band, window, width, height, method)?);
        }
        let data = stack(values, height, width)?;

        let asset_nodata = self.nodata();
        let mut mask = Array3::from_elem(data.dim(), false);
        for ((b, row, col), m) in mask.indexed_iter_mut() {
            let v = data[[b, row, col]];
            let uncovered = weights.as_ref().is_some_and(|w| w[[row, col]] <= 0.0);
            *m = uncovered || is_nodata(v, ds.band_nodata(bands[b])) || is_nodata(v, asset_nodata);
        }

        debug!(
            bands = bands.len(),
            width,
            height,
            x_off = burned.x_off,
            y_off = burned.y_off,
            "read region"
        );

        Ok(RegionData {
            data: MaskedArray::new(data, mask)?,
            weights,
        })
    }
}
