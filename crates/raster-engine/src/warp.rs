//! Reprojection of rasters onto a new grid.
//!
//! A [`WarpDescriptor`] says what the destination grid looks like and how
//! source bands map onto it. [`WarpDescriptor::auto_create`] suggests a
//! grid covering the whole source in the target reference;
//! [`WarpedDataset`] exposes the result as a lazily computed
//! [`RasterDataset`].
//!
//! ```text
//! destination pixel centre ──geotransform──▶ target coords
//!        ──CoordTransform──▶ source coords ──inverse geotransform──▶
//!        source pixel position ──SampleGrid::sample──▶ value
//! ```

use std::sync::Arc;

use projection::{CoordTransform, SpatialRef};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::dataset::RasterDataset;
use crate::error::{RasterError, Result};
use crate::types::{GeoTransform, ResampleMethod};

/// Points sampled along each source edge when suggesting an output grid.
const EDGE_SAMPLES: usize = 21;

/// Source pixels read around the mapped footprint for kernel support.
const WARP_MARGIN: i64 = 3;

/// How destination pixels with no source coverage are initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitDest {
    #[default]
    Zero,
    /// The band mapping's destination no-data value.
    NoData,
}

/// Source band to destination band, with optional no-data values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandMapping {
    pub src: usize,
    pub dst: usize,
    pub src_nodata_real: Option<f64>,
    pub src_nodata_imag: Option<f64>,
    pub dst_nodata_real: Option<f64>,
    pub dst_nodata_imag: Option<f64>,
}

impl BandMapping {
    /// Map source band `band` to the same destination band, no no-data.
    pub fn plain(band: usize) -> Self {
        Self {
            src: band,
            dst: band,
            ..Default::default()
        }
    }

    /// Use `nodata` for both source and destination.
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.src_nodata_real = nodata;
        self.dst_nodata_real = nodata;
        self.src_nodata_imag = nodata.map(|_| 0.0);
        self.dst_nodata_imag = nodata.map(|_| 0.0);
        self
    }
}

/// Everything needed to warp a source raster onto a destination grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpDescriptor {
    pub source_srs: String,
    pub target_srs: String,
    pub resample: ResampleMethod,
    pub init_dest: InitDest,
    pub band_mappings: Vec<BandMapping>,
    pub geo_transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl WarpDescriptor {
    /// Suggest a north-up destination grid covering all of `source` in
    /// `target_srs`, keeping roughly the source's pixel count along the
    /// diagonal.
    ///
    /// The descriptor starts with [`InitDest::Zero`] and plain band
    /// mappings.
    #[instrument(level = "debug", skip(source, target_srs))]
    pub fn auto_create(
        source: &dyn RasterDataset,
        target_srs: &str,
        resample: ResampleMethod,
    ) -> Result<Self> {
        let src_ref = SpatialRef::from_user_input(source.projection())?;
        let dst_ref = SpatialRef::from_user_input(target_srs)?;
        let transform = CoordTransform::new(src_ref, dst_ref);

        let band_mappings = (1..=source.band_count()).map(BandMapping::plain).collect();
        let (width, height) = (source.width(), source.height());

        if transform.is_identity() {
            return Ok(Self {
                source_srs: source.projection().to_string(),
                target_srs: target_srs.to_string(),
                resample,
                init_dest: InitDest::Zero,
                band_mappings,
                geo_transform: source.geo_transform(),
                width,
                height,
            });
        }

        let gt = source.geo_transform();
        let mut points = edge_points(width as f64, height as f64)
            .into_iter()
            .map(|(px, py)| gt.pixel_to_world(px, py))
            .collect::<Vec<_>>();
        transform.transform_points(&mut points);

        let finite: Vec<(f64, f64)> = points
            .into_iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        if finite.is_empty() {
            return Err(RasterError::ProjectionError(format!(
                "no source edge point maps into {}",
                dst_ref
            )));
        }

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in &finite {
            min_x = min_x.min(*x);
            min_y = min_y.min(*y);
            max_x = max_x.max(*x);
            max_y = max_y.max(*y);
        }

        let diagonal = ((max_x - min_x).powi(2) + (max_y - min_y).powi(2)).sqrt();
        let pixels = ((width * width + height * height) as f64).sqrt();
        let res = diagonal / pixels;
        if !(res.is_finite() && res > 0.0) {
            return Err(RasterError::ProjectionError(format!(
                "degenerate output extent in {}",
                dst_ref
            )));
        }

        let out_w = (((max_x - min_x) / res) + 0.5).floor().max(1.0) as usize;
        let out_h = (((max_y - min_y) / res) + 0.5).floor().max(1.0) as usize;

        debug!(out_w, out_h, res, "suggested warp output");

        Ok(Self {
            source_srs: source.projection().to_string(),
            target_srs: target_srs.to_string(),
            resample,
            init_dest: InitDest::Zero,
            band_mappings,
            geo_transform: GeoTransform::new(min_x, res, max_y, -res),
            width: out_w,
            height: out_h,
        })
    }

    /// Fill uncovered pixels with no-data, using `nodata[i]` for band `i + 1`.
    pub fn use_band_nodata(&mut self, nodata: &[Option<f64>]) {
        self.init_dest = InitDest::NoData;
        for mapping in &mut self.band_mappings {
            let nd = nodata.get(mapping.src.wrapping_sub(1)).copied().flatten();
            *mapping = mapping.with_nodata(nd);
        }
    }
}

/// Pixel positions along the four edges of a `w × h` raster.
fn edge_points(w: f64, h: f64) -> Vec<(f64, f64)> {
    let n = EDGE_SAMPLES - 1;
    (0..=n)
        .flat_map(|i| {
            let t = i as f64 / n as f64;
            [(t * w, 0.0), (t * w, h), (0.0, t * h), (w, t * h)]
        })
        .collect()
}

/// A source raster seen through a [`WarpDescriptor`].
pub struct WarpedDataset {
    source: Arc<dyn RasterDataset>,
    descriptor: WarpDescriptor,
    /// Target to source coordinates.
    to_source: CoordTransform,
}

impl WarpedDataset {
    pub fn new(source: Arc<dyn RasterDataset>, descriptor: WarpDescriptor) -> Result<Self> {
        let src_ref = SpatialRef::from_user_input(&descriptor.source_srs)?;
        let dst_ref = SpatialRef::from_user_input(&descriptor.target_srs)?;
        for mapping in &descriptor.band_mappings {
            source.check_band(mapping.src)?;
        }
        Ok(Self {
            source,
            descriptor,
            to_source: CoordTransform::new(dst_ref, src_ref),
        })
    }

    pub fn descriptor(&self) -> &WarpDescriptor {
        &self.descriptor
    }

    fn mapping(&self, band: usize) -> Result<&BandMapping> {
        self.descriptor
            .band_mappings
            .iter()
            .find(|m| m.dst == band)
            .ok_or(RasterError::InvalidBand {
                band,
                count: self.band_count(),
            })
    }
}

impl RasterDataset for WarpedDataset {
    fn band_count(&self) -> usize {
        self.descriptor.band_mappings.len()
    }

    fn width(&self) -> usize {
        self.descriptor.width
    }

    fn height(&self) -> usize {
        self.descriptor.height
    }

    fn geo_transform(&self) -> GeoTransform {
        self.descriptor.geo_transform
    }

    fn projection(&self) -> &str {
        &self.descriptor.target_srs
    }

    fn band_nodata(&self, band: usize) -> Option<f64> {
        self.mapping(band).ok().and_then(|m| m.dst_nodata_real)
    }

    fn read_native(&self, band: usize, x: usize, y: usize, w: usize, h: usize) -> Result<Vec<f64>> {
        let mapping = *self.mapping(band)?;
        let unmapped = match self.descriptor.init_dest {
            InitDest::Zero => 0.0,
            InitDest::NoData => mapping.dst_nodata_real.unwrap_or(f64::NAN),
        };
        if w == 0 || h == 0 {
            return Ok(Vec::new());
        }

        let dst_gt = self.descriptor.geo_transform;
        let src_inv = self.source.geo_transform().inverse()?;

        // Source pixel position of every destination pixel centre
        let positions: Vec<(f64, f64)> = (0..h)
            .into_par_iter()
            .flat_map_iter(|j| {
                (0..w).map(move |i| {
                    let (tx, ty) =
                        dst_gt.pixel_to_world((x + i) as f64 + 0.5, (y + j) as f64 + 0.5);
                    let (sx, sy) = self.to_source.transform(tx, ty);
                    src_inv.apply(sx, sy)
                })
            })
            .collect();

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (px, py) in positions.iter().filter(|(a, b)| a.is_finite() && b.is_finite()) {
            min_x = min_x.min(*px);
            min_y = min_y.min(*py);
            max_x = max_x.max(*px);
            max_y = max_y.max(*py);
        }
        if !min_x.is_finite() {
            return Ok(vec![unmapped; w * h]);
        }

        // Clamped in floating point so far-off positions cannot overflow
        let margin = WARP_MARGIN as f64;
        let (src_w, src_h) = (self.source.width() as f64, self.source.height() as f64);
        let bx0 = (min_x.floor() - margin).clamp(-1.0, src_w + 1.0) as i64;
        let by0 = (min_y.floor() - margin).clamp(-1.0, src_h + 1.0) as i64;
        let bx1 = (max_x.ceil() + margin).clamp(-1.0, src_w + 1.0) as i64;
        let by1 = (max_y.ceil() + margin).clamp(-1.0, src_h + 1.0) as i64;
        if bx1 <= bx0 || by1 <= by0 {
            return Ok(vec![unmapped; w * h]);
        }

        let grid = self.source.read_block_with_nodata(
            mapping.src,
            bx0,
            by0,
            (bx1 - bx0) as usize,
            (by1 - by0) as usize,
            mapping.src_nodata_real,
        )?;

        // Destination pixel size in source pixels, for area methods
        let footprint = (
            ((max_x - min_x) / w as f64).max(1.0),
            ((max_y - min_y) / h as f64).max(1.0),
        );
        let method = self.descriptor.resample;

        let mut out = vec![unmapped; w * h];
        out.par_chunks_mut(w)
            .zip(positions.par_chunks(w))
            .for_each(|(row, pos)| {
                for (v, (px, py)) in row.iter_mut().zip(pos) {
                    if let Some(s) = grid.sample(method, *px, *py, footprint) {
                        *v = s;
                    }
                }
            });

        Ok(out)
    }
}
