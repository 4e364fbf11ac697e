//! Georeferenced raster access.
//!
//! This crate reads multi-band rasters stored as Zarr V3 arrays and
//! provides the pixel-level operations the map service builds on:
//!
//! - **Windowed reads** at any output size with GDAL-style resampling
//! - **Warping** onto a grid in another spatial reference
//! - **Rasterizing** polygons into burn or coverage masks
//!
//! # Architecture
//!
//! ```text
//! <name>.zarr ──ZarrDataset::open──▶ dyn RasterDataset
//!                                          │
//!             ┌────────────────────────────┼───────────────────────┐
//!             ▼                            ▼                       ▼
//!    WarpDescriptor::auto_create    read_window(window,       rasterize(geometry,
//!             │                       out_w, out_h,            geotransform)
//!             ▼                       resample)                     │
//!       WarpedDataset ─────────────────▶ │                          ▼
//!     (also a RasterDataset)             ▼                   RasterizedRegion
//!                                   Vec<f64> band values
//! ```
//!
//! # Example
//!
//! ```ignore
//! use raster_engine::{read_window, PixelWindow, RasterDataset, ResampleMethod, ZarrDataset};
//!
//! let ds = ZarrDataset::open(Path::new("/data/maps/ndvi/default.zarr"))?;
//! let window = PixelWindow::new(0.0, 0.0, ds.width() as f64, ds.height() as f64);
//! let thumb = read_window(&ds, 1, window, 64, 64, ResampleMethod::Average)?;
//! ```

pub mod dataset;
pub mod error;
pub mod geometry;
pub mod rasterize;
pub mod sampling;
pub mod types;
pub mod warp;
pub mod zarr;

pub use dataset::{read_window, MemDataset, RasterDataset};
pub use error::{RasterError, Result};
pub use geometry::{Geometry, Ring};
pub use rasterize::{
    rasterize, BurnMode, RasterizedRegion, COVERAGE_SUBDIVISIONS, MAX_RASTERIZE_PIXELS,
};
pub use sampling::{is_nodata, SampleGrid};
pub use types::{GeoTransform, PixelWindow, ResampleMethod, WorldToPixel};
pub use warp::{BandMapping, InitDest, WarpDescriptor, WarpedDataset};
pub use zarr::{write_zarr_raster, RasterSpec, ZarrDataset};
