//! Reprojected views of assets.
//!
//! The suggested warp descriptor initialises uncovered destination pixels
//! to zero, which reads back as valid data. Before the view is built the
//! descriptor is switched to no-data initialisation and every band gets an
//! explicit no-data mapping from its own no-data tag, so pixels without a
//! valid source stay masked.

use std::sync::Arc;

use projection::SpatialRef;
use raster_engine::{RasterDataset, ResampleMethod, WarpDescriptor, WarpedDataset};
use stmap_common::StmapResult;
use tracing::{debug, instrument};

use crate::asset::Asset;

/// Descriptor for warping `source` into `target` with no-data propagated.
pub fn nodata_descriptor(
    source: &dyn RasterDataset,
    target: &SpatialRef,
    method: ResampleMethod,
) -> StmapResult<WarpDescriptor> {
    let mut descriptor = WarpDescriptor::auto_create(source, target.to_wkt(), method)?;
    let nodata: Vec<Option<f64>> = (1..=source.band_count()).map(|b| source.band_nodata(b)).collect();
    descriptor.use_band_nodata(&nodata);
    Ok(descriptor)
}

impl Asset {
    /// Replace the asset's raster with a view reprojected into `target`.
    ///
    /// Band counts, no-data values and geotransform are served by the new
    /// view from here on.
    #[instrument(level = "debug", skip(self, target), fields(asset = %self.name, target = %target))]
    pub fn warp_to(mut self, target: &SpatialRef, method: ResampleMethod) -> StmapResult<Self> {
        let descriptor = nodata_descriptor(self.dataset.as_ref(), target, method)?;
        debug!(
            width = descriptor.width,
            height = descriptor.height,
            resample = %method,
            "warping asset"
        );
        let warped = WarpedDataset::new(Arc::clone(&self.dataset), descriptor)?;
        self.dataset = Arc::new(warped);
        Ok(self)
    }
}
