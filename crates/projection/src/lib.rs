//! Spatial references and coordinate transformations.
//!
//! Implements the two references the query pipeline works in, geographic
//! WGS84 and spherical Web Mercator, from scratch without external
//! dependencies. Definitions are accepted as EPSG codes, WKT, PROJ.4 strings
//! or free-form user input and normalised to a [`SpatialRef`].

pub mod error;
pub mod mercator;
pub mod srs;
pub mod transform;

pub use error::{ProjectionError, Result};
pub use mercator::{lonlat_to_mercator, mercator_to_lonlat, EARTH_RADIUS, MAX_LATITUDE};
pub use srs::{SpatialRef, SrsType, WEB_MERCATOR_WKT, WGS84_WKT};
pub use transform::CoordTransform;
