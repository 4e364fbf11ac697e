//! TMS tile endpoint: `/TMS/{asset}/{date}/{z}/{x}/{y}.png`.
//!
//! Tiles use TMS numbering (row 0 at the bottom) and are drawn as 256x256
//! PNG windows in Web Mercator.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::Response,
};
use stmap_common::StmapError;
use stmap_core::Call;
use tracing::debug;

use crate::handlers::common::{error_response, execute};
use crate::state::AppState;

/// GET /TMS/:asset/:date/:z/:x/:y
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((asset, date, z, x, y)): Path<(String, String, u32, u32, String)>,
) -> Response {
    let y = match parse_tile_row(&y) {
        Ok(y) => y,
        Err(err) => return error_response(&err),
    };
    if z > 30 {
        return error_response(&StmapError::invalid_parameter("zoom", format!("{} is too deep", z)));
    }
    debug!(asset = %asset, date = %date, z, x, y, "tile request");

    execute(state, Call::tile(&asset, &date, z, x, y)).await
}

/// Tile row from the last path segment, with or without `.png`.
fn parse_tile_row(segment: &str) -> Result<u32, StmapError> {
    let digits = segment.strip_suffix(".png").unwrap_or(segment);
    digits
        .parse()
        .map_err(|_| StmapError::invalid_parameter("y", format!("'{}' is not a tile row", segment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tile_row() {
        assert_eq!(parse_tile_row("47.png").unwrap(), 47);
        assert_eq!(parse_tile_row("47").unwrap(), 47);
        assert!(parse_tile_row("47.jpg").is_err());
        assert!(parse_tile_row("-1").is_err());
    }
}
