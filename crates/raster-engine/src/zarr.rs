//! Zarr V3 raster storage.
//!
//! A raster is a single `float32` array of shape `[bands, rows, cols]`
//! stored in a `<name>.zarr` directory. Georeferencing lives in the array
//! attributes:
//!
//! | attribute      | value                                              |
//! |----------------|----------------------------------------------------|
//! | `geotransform` | six numbers, see [`GeoTransform`]                  |
//! | `projection`   | spatial reference definition, usually WKT          |
//! | `nodata`       | a number, `null`, or one entry per band            |

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::dataset::RasterDataset;
use crate::error::{RasterError, Result};
use crate::types::GeoTransform;

/// Chunk edge length used when writing rasters.
const CHUNK_SIZE: u64 = 256;

/// A raster stored as a Zarr array on the local filesystem.
pub struct ZarrDataset {
    array: Array<FilesystemStore>,
    bands: usize,
    height: usize,
    width: usize,
    geo_transform: GeoTransform,
    projection: String,
    nodata: Vec<Option<f64>>,
}

impl ZarrDataset {
    /// Open the raster stored at `path`.
    #[instrument(level = "debug")]
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(RasterError::open_failed(format!(
                "{} is not a raster directory",
                path.display()
            )));
        }

        let store = FilesystemStore::new(path)
            .map_err(|e| RasterError::open_failed(format!("{}: {}", path.display(), e)))?;
        let array = Array::open(Arc::new(store), "/")
            .map_err(|e| RasterError::open_failed(format!("{}: {}", path.display(), e)))?;

        let shape = array.shape();
        if shape.len() != 3 {
            return Err(RasterError::invalid_metadata(format!(
                "expected a [bands, rows, cols] array, found {} dimensions",
                shape.len()
            )));
        }
        let (bands, height, width) = (shape[0] as usize, shape[1] as usize, shape[2] as usize);

        let attrs = array.attributes();
        let geo_transform = parse_geotransform(attrs)?;
        let projection = attrs
            .get("projection")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let nodata = parse_nodata(attrs.get("nodata"), bands)?;

        debug!(bands, width, height, "opened raster");

        Ok(Self {
            array,
            bands,
            height,
            width,
            geo_transform,
            projection,
            nodata,
        })
    }
}

impl RasterDataset for ZarrDataset {
    fn band_count(&self) -> usize {
        self.bands
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    fn projection(&self) -> &str {
        &self.projection
    }

    fn band_nodata(&self, band: usize) -> Option<f64> {
        self.nodata.get(band.checked_sub(1)?).copied().flatten()
    }

    fn read_native(&self, band: usize, x: usize, y: usize, w: usize, h: usize) -> Result<Vec<f64>> {
        self.check_band(band)?;
        if w == 0 || h == 0 {
            return Ok(Vec::new());
        }

        let subset = ArraySubset::new_with_start_shape(
            vec![(band - 1) as u64, y as u64, x as u64],
            vec![1, h as u64, w as u64],
        )
        .map_err(|e| RasterError::read_failed(e.to_string()))?;

        let data: Vec<f32> = self
            .array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| RasterError::read_failed(e.to_string()))?;

        Ok(data.into_iter().map(f64::from).collect())
    }
}

fn parse_geotransform(attrs: &Map<String, Value>) -> Result<GeoTransform> {
    let values = attrs
        .get("geotransform")
        .and_then(Value::as_array)
        .ok_or_else(|| RasterError::invalid_metadata("missing geotransform attribute"))?;

    let coeffs: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    let coeffs: [f64; 6] = coeffs.try_into().map_err(|_| {
        RasterError::invalid_metadata("geotransform must hold six numbers")
    })?;
    Ok(GeoTransform::from_array(coeffs))
}

fn parse_nodata(value: Option<&Value>, bands: usize) -> Result<Vec<Option<f64>>> {
    match value {
        None | Some(Value::Null) => Ok(vec![None; bands]),
        Some(Value::Number(n)) => Ok(vec![n.as_f64(); bands]),
        Some(Value::Array(items)) if items.len() == bands => {
            Ok(items.iter().map(Value::as_f64).collect())
        }
        Some(other) => Err(RasterError::invalid_metadata(format!(
            "nodata must be a number, null or one value per band, got {}",
            other
        ))),
    }
}

/// Description of a raster to write with [`write_zarr_raster`].
#[derive(Debug, Clone)]
pub struct RasterSpec<'a> {
    pub width: usize,
    pub height: usize,
    pub geo_transform: GeoTransform,
    pub projection: &'a str,
    pub nodata: Vec<Option<f64>>,
}

/// Write a raster to `path`. `bands` holds one row-major
/// `width * height` buffer per band.
pub fn write_zarr_raster(path: &Path, spec: &RasterSpec<'_>, bands: &[Vec<f32>]) -> Result<()> {
    let expected = spec.width * spec.height;
    if let Some(bad) = bands.iter().position(|b| b.len() != expected) {
        return Err(RasterError::invalid_metadata(format!(
            "band {} has {} values, expected {}",
            bad + 1,
            bands[bad].len(),
            expected
        )));
    }
    if spec.nodata.len() != bands.len() {
        return Err(RasterError::invalid_metadata(
            "nodata needs one entry per band",
        ));
    }

    write_array(path, spec, bands).map_err(|e| RasterError::storage_error(e.to_string()))?;
    debug!(path = %path.display(), bands = bands.len(), "wrote raster");
    Ok(())
}

fn write_array(
    path: &Path,
    spec: &RasterSpec<'_>,
    bands: &[Vec<f32>],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);

    let shape = vec![bands.len() as u64, spec.height as u64, spec.width as u64];
    let chunks = vec![
        1,
        (spec.height as u64).clamp(1, CHUNK_SIZE),
        (spec.width as u64).clamp(1, CHUNK_SIZE),
    ];

    let nodata = if spec.nodata.iter().all(|n| *n == spec.nodata[0]) {
        json!(spec.nodata.first().copied().flatten())
    } else {
        json!(spec.nodata)
    };

    let array = ArrayBuilder::new(
        shape,
        DataType::Float32,
        chunks.try_into()?,
        FillValue::from(f32::NAN),
    )
    .attributes({
        let mut attrs = Map::new();
        attrs.insert(
            "geotransform".to_string(),
            json!(spec.geo_transform.to_array()),
        );
        attrs.insert("projection".to_string(), json!(spec.projection));
        attrs.insert("nodata".to_string(), nodata);
        attrs
    })
    .build(store, "/")?;

    array.store_metadata()?;

    for (i, data) in bands.iter().enumerate() {
        let subset = ArraySubset::new_with_start_shape(
            vec![i as u64, 0, 0],
            vec![1, spec.height as u64, spec.width as u64],
        )?;
        array.store_array_subset_elements(&subset, data.as_slice())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nodata_forms() {
        assert_eq!(parse_nodata(None, 2).unwrap(), vec![None, None]);
        assert_eq!(
            parse_nodata(Some(&json!(-9999)), 2).unwrap(),
            vec![Some(-9999.0), Some(-9999.0)]
        );
        assert_eq!(
            parse_nodata(Some(&json!([1.5, null])), 2).unwrap(),
            vec![Some(1.5), None]
        );
        assert!(parse_nodata(Some(&json!([1.5])), 2).is_err());
        assert!(parse_nodata(Some(&json!("x")), 1).is_err());
    }

    #[test]
    fn test_parse_geotransform() {
        let mut attrs = Map::new();
        attrs.insert("geotransform".into(), json!([0, 1, 0, 10, 0, -1]));
        let gt = parse_geotransform(&attrs).unwrap();
        assert_eq!(gt.origin_y, 10.0);

        attrs.insert("geotransform".into(), json!([0, 1]));
        assert!(parse_geotransform(&attrs).is_err());
    }

    #[test]
    fn test_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ZarrDataset::open(&dir.path().join("nope.zarr")),
            Err(RasterError::OpenFailed(_))
        ));
    }
}
