//! Spatiotemporal queries over multi-band raster time series.
//!
//! Given an asset name, a window or region, and a date or date range, the
//! pipeline returns a (possibly reprojected and reduced) masked array of
//! pixel values encoded in the requested output format.
//!
//! # Architecture
//!
//! ```text
//! Call { operation, params }
//!      │
//!      ▼
//! AssetResolver::resolve(name) ── <root>/a/b.zarr + YAML cascade
//!      │
//!      ├─► Asset::warp_to(srs)          (optional, no-data preserved)
//!      │
//!      ├─► Asset::get_window(bounds, date, size)
//!      │   Asset::get_region(region, date, coverage) ──► MaskedArray (+ weights)
//!      │
//!      ├─► reduce([t_mean, s_max, ...])  (optional)
//!      │
//!      └─► encode(json | yaml | msgpack | raw | png) ──► Response
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stmap_core::{Call, CoreConfig, Dispatcher};
//!
//! let dispatcher = Dispatcher::new(&CoreConfig::from_env());
//! let call = Call::from_pairs([
//!     ("operation", "regions"),
//!     ("asset", "forest.biomass"),
//!     ("region", r#"{"type": "Point", "coordinates": [-123.2, 44.5]}"#),
//!     ("region_srs", "EPSG:4326"),
//!     ("reducers", "t_mean"),
//! ])?;
//! let (body, content_type) = dispatcher.dispatch(&call)?.into_encoded()?;
//! ```

pub mod asset;
pub mod bands;
pub mod config;
pub mod extract;
pub mod masked;
pub mod operations;
pub mod output;
pub mod reducers;
pub mod region;
pub mod reproject;
pub mod request;

pub use asset::{Asset, AssetResolver, Metadata, MetadataLayer};
pub use bands::BandIndex;
pub use config::{ConfigError, CoreConfig};
pub use extract::{window_for_bounds, Coverage, RegionData};
pub use masked::{MaskedArray, WeightMask};
pub use operations::{Dispatcher, Operation};
pub use output::{encode, sniff_content_type, OutputFormat, Payload, Response};
pub use reducers::{reduce, Dimension, Reducer, Statistic};
pub use region::{Region, RegionFormat};
pub use reproject::nodata_descriptor;
pub use request::{Call, TILE_SIZE};

// Re-export the shared taxonomy so callers need only this crate
pub use stmap_common::{StmapError, StmapResult};
