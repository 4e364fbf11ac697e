//! Tile math for the TMS tile endpoint.
//!
//! Tiles follow the TMS convention used by the tile routes: `y` is counted
//! from the top of the world, zoom `z` splits the world into `2^z` tiles per
//! axis, and bounds are in spherical Web Mercator meters.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// Side length of the Web Mercator world square, in meters (2·π·6378137).
pub const WORLD_EXTENT: f64 = 40075016.68557849;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Bounds of this tile in Web Mercator meters.
    pub fn bounds(&self) -> BoundingBox {
        tile_bounds(self.x, self.y, self.z)
    }
}

fn tiles_per_axis(zoom: u32) -> f64 {
    2f64.powi(zoom as i32)
}

/// Bounds of tile `(x, y)` at `zoom`, in Web Mercator meters.
pub fn tile_bounds(x: u32, y: u32, zoom: u32) -> BoundingBox {
    let z = tiles_per_axis(zoom);
    let tx = x as f64;
    let ty = z - 1.0 - y as f64;

    BoundingBox::new(
        WORLD_EXTENT * (tx / z - 0.5),
        WORLD_EXTENT * (ty / z - 0.5),
        WORLD_EXTENT * ((tx + 1.0) / z - 0.5),
        WORLD_EXTENT * ((ty + 1.0) / z - 0.5),
    )
}

/// The tile at `zoom` containing a Web Mercator point. Points beyond the
/// world edge are clamped onto the outermost tiles.
pub fn tile_for_point(px: f64, py: f64, zoom: u32) -> TileCoord {
    let z = tiles_per_axis(zoom);
    let last = z - 1.0;

    let tx = ((px / WORLD_EXTENT + 0.5) * z).floor().clamp(0.0, last);
    let ty = ((py / WORLD_EXTENT + 0.5) * z).floor().clamp(0.0, last);

    TileCoord::new(zoom, tx as u32, (last - ty) as u32)
}

/// Recover the tile whose bounds are `bounds`, if they describe one.
///
/// The zoom comes from the bounds width; the tile from the bounds centre.
/// Bounds that do not line up with a tile return `None`.
pub fn tile_from_bounds(bounds: &BoundingBox) -> Option<TileCoord> {
    let width = bounds.width();
    if !(width > 0.0) {
        return None;
    }
    let zoom = (WORLD_EXTENT / width).log2().round();
    if !(0.0..=30.0).contains(&zoom) {
        return None;
    }
    let zoom = zoom as u32;

    let cx = (bounds.min_x + bounds.max_x) / 2.0;
    let cy = (bounds.min_y + bounds.max_y) / 2.0;
    let tile = tile_for_point(cx, cy, zoom);

    let expected = tile.bounds();
    let tolerance = width * 1e-6;
    let aligned = (expected.min_x - bounds.min_x).abs() < tolerance
        && (expected.min_y - bounds.min_y).abs() < tolerance
        && (expected.max_x - bounds.max_x).abs() < tolerance
        && (expected.max_y - bounds.max_y).abs() < tolerance;

    aligned.then_some(tile)
}

/// Convert TMS tile numbering to Google/XYZ numbering (and back; the
/// mapping is its own inverse).
pub fn google_tile(x: u32, y: u32, zoom: u32) -> (u32, u32) {
    let last = (1u64 << zoom) - 1;
    (x, (last - y as u64) as u32)
}
