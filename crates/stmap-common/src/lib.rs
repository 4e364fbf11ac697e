//! Common types and utilities shared across the stmap crates and services.

pub mod bbox;
pub mod error;
pub mod tile;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{ErrorPayload, StmapError, StmapResult};
pub use tile::{google_tile, tile_bounds, tile_for_point, tile_from_bounds, TileCoord, WORLD_EXTENT};
pub use time::{parse_date, DateParseError, DateSelector};
