//! Temporary data roots for pipeline tests.
//!
//! An [`AssetTree`] is a throwaway directory laid out like a real data
//! root: Zarr rasters, YAML metadata layers and icon files at relative
//! paths. It is deleted when dropped.

use std::fs;
use std::path::{Path, PathBuf};

use raster_engine::{write_zarr_raster, GeoTransform, RasterSpec};
use tempfile::TempDir;

/// Common spatial reference identifiers.
pub mod crs {
    /// WGS84 geographic
    pub const EPSG_4326: &str = "EPSG:4326";

    /// Web Mercator
    pub const EPSG_3857: &str = "EPSG:3857";
}

/// Grid description for a test raster, owning its projection string.
#[derive(Debug, Clone)]
pub struct GridFixture {
    pub width: usize,
    pub height: usize,
    pub geo_transform: GeoTransform,
    pub projection: String,
    pub nodata: Option<f64>,
}

impl GridFixture {
    pub fn spec(&self, bands: usize) -> RasterSpec<'_> {
        RasterSpec {
            width: self.width,
            height: self.height,
            geo_transform: self.geo_transform,
            projection: &self.projection,
            nodata: vec![self.nodata; bands],
        }
    }
}

/// A `width × height` WGS84 grid of one-degree pixels with its upper-left
/// corner at (-180, 90).
pub fn geographic_grid(width: usize, height: usize, nodata: Option<f64>) -> GridFixture {
    GridFixture {
        width,
        height,
        geo_transform: GeoTransform::new(-180.0, 1.0, 90.0, -1.0),
        projection: crs::EPSG_4326.to_string(),
        nodata,
    }
}

/// A grid of one-unit pixels anchored at `(origin_x, origin_y)`.
pub fn unit_grid(width: usize, height: usize, origin: (f64, f64), nodata: Option<f64>) -> GridFixture {
    GridFixture {
        width,
        height,
        geo_transform: GeoTransform::new(origin.0, 1.0, origin.1, -1.0),
        projection: crs::EPSG_4326.to_string(),
        nodata,
    }
}

/// A temporary data root.
pub struct AssetTree {
    dir: TempDir,
}

impl AssetTree {
    /// Create an empty data root.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("stmap_test_")
            .tempdir()
            .expect("Failed to create temp directory");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a raster at `<root>/<relative>.zarr`, e.g. `"forest/biomass"`.
    pub fn add_raster(&self, relative: &str, grid: &GridFixture, bands: &[Vec<f32>]) -> PathBuf {
        let path = self.root().join(format!("{}.zarr", relative));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create raster directory");
        }
        write_zarr_raster(&path, &grid.spec(bands.len()), bands).expect("Failed to write raster");
        path
    }

    /// Write a YAML layer at `<root>/<relative>`, e.g. `"forest/default.yaml"`.
    pub fn add_yaml(&self, relative: &str, text: &str) -> PathBuf {
        self.add_file(relative, text.as_bytes())
    }

    /// Write arbitrary bytes at `<root>/<relative>`.
    pub fn add_file(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(&path, bytes).expect("Failed to write file");
        path
    }
}

impl Default for AssetTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::ramp_band;

    #[test]
    fn test_tree_layout() {
        let tree = AssetTree::new();
        let raster = tree.add_raster("ndvi/default", &geographic_grid(4, 2, None), &[ramp_band(4, 2, 1)]);
        assert!(raster.is_dir());
        assert!(raster.ends_with("ndvi/default.zarr"));

        let yaml = tree.add_yaml("ndvi.yaml", "units: none\n");
        assert_eq!(fs::read_to_string(yaml).unwrap(), "units: none\n");
    }

    #[test]
    fn test_grid_spec_repeats_nodata() {
        let grid = unit_grid(3, 3, (0.0, 3.0), Some(-1.0));
        let spec = grid.spec(2);
        assert_eq!(spec.nodata, vec![Some(-1.0), Some(-1.0)]);
        assert_eq!(spec.projection, "EPSG:4326");
    }
}
