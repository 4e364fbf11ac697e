//! Asset resolution.
//!
//! An asset is named by a dotted path below the data root. `forest.biomass`
//! is the raster `<root>/forest/biomass.zarr`; a single segment `ndvi`
//! means `<root>/ndvi/default.zarr`.
//!
//! Metadata is the shallow merge of an ordered list of YAML layers over the
//! raster's native properties. For each prefix `p` of the path, from the
//! root down, the layers are `p.yaml`, `p/default.yaml` and
//! `p/<last segment of p>.yaml`. Later layers overwrite earlier keys.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use raster_engine::{RasterDataset, ResampleMethod, ZarrDataset};
use serde_json::{json, Map, Value};
use stmap_common::{StmapError, StmapResult};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::bands::BandIndex;

/// Raster file extension.
pub const RASTER_EXT: &str = "zarr";

/// Leaf used when a name has a single segment.
pub const DEFAULT_LEAF: &str = "default";

/// Icon image extensions, in lookup order.
pub const ICON_EXTENSIONS: [&str; 4] = ["jpg", "png", "gif", "bmp"];

/// Merged asset metadata.
pub type Metadata = Map<String, Value>;

/// One YAML file in the metadata cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataLayer {
    pub path: PathBuf,
    pub values: Metadata,
}

/// Resolves asset names below a data root.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path segments for `name`, with the default leaf appended to single
    /// segment names.
    fn segments(name: &str) -> StmapResult<Vec<String>> {
        let mut tree: Vec<String> = name.trim().split('.').map(str::to_string).collect();
        let valid = tree
            .iter()
            .all(|s| !s.is_empty() && !s.contains(|c: char| c == '/' || c == '\\'));
        if !valid {
            return Err(StmapError::AssetNotFound(name.to_string()));
        }
        if tree.len() == 1 {
            tree.push(DEFAULT_LEAF.to_string());
        }
        Ok(tree)
    }

    /// Raster path for `name`.
    pub fn raster_path(&self, name: &str) -> StmapResult<PathBuf> {
        let tree = Self::segments(name)?;
        let mut path = self.root.join(tree.join("/"));
        append_extension(&mut path, RASTER_EXT);
        Ok(path)
    }

    /// Existing metadata layer files for `name`, most general first.
    pub fn layer_paths(&self, name: &str) -> StmapResult<Vec<PathBuf>> {
        let tree = Self::segments(name)?;
        let mut seen = HashSet::new();
        let mut paths = Vec::new();

        for depth in 1..=tree.len() {
            let base = self.root.join(tree[..depth].join("/"));
            let mut sibling = base.clone();
            append_extension(&mut sibling, "yaml");
            let candidates = [
                sibling,
                base.join("default.yaml"),
                base.join(format!("{}.yaml", tree[depth - 1])),
            ];
            for candidate in candidates {
                if candidate.is_file() && seen.insert(candidate.clone()) {
                    paths.push(candidate);
                }
            }
        }
        Ok(paths)
    }

    /// Open the asset called `name`.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve(&self, name: &str) -> StmapResult<Asset> {
        let path = self.raster_path(name)?;
        if !path.is_dir() {
            return Err(StmapError::AssetNotFound(name.to_string()));
        }

        let dataset: Arc<dyn RasterDataset> = Arc::new(ZarrDataset::open(&path)?);

        let layers = self
            .layer_paths(name)?
            .into_iter()
            .map(|p| load_layer(&p))
            .collect::<StmapResult<Vec<_>>>()?;
        let metadata = merge_layers(native_metadata(dataset.as_ref()), &layers);
        let band_index = BandIndex::from_metadata(metadata.get("band-dates"), dataset.band_count())?;

        debug!(
            asset = name,
            layers = layers.len(),
            bands = dataset.band_count(),
            dated_bands = band_index.len(),
            "resolved asset"
        );

        Ok(Asset {
            name: name.to_string(),
            path,
            dataset,
            metadata,
            band_index,
        })
    }

    /// Every asset name under the root, sorted.
    ///
    /// A directory holding `default.zarr` is listed under its own dotted
    /// name; any other `<leaf>.zarr` is listed as `<dir>.<leaf>`.
    pub fn list(&self) -> StmapResult<Vec<String>> {
        let mut names = Vec::new();
        let mut walker = WalkDir::new(&self.root).min_depth(1).into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| StmapError::InternalError(format!("listing assets: {}", e)))?;
            if !entry.file_type().is_dir() || !is_raster(entry.path()) {
                continue;
            }
            // A raster is a directory of chunks; nothing below it is an asset
            walker.skip_current_dir();

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let mut parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let Some(leaf) = parts.pop() else { continue };
            let stem = leaf.trim_end_matches(&format!(".{}", RASTER_EXT)).to_string();
            if stem != DEFAULT_LEAF {
                parts.push(stem);
            }
            if !parts.is_empty() {
                names.push(parts.join("."));
            }
        }

        names.sort();
        names.dedup();
        info!(root = %self.root.display(), count = names.len(), "listed assets");
        Ok(names)
    }
}

fn is_raster(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == RASTER_EXT)
}

fn append_extension(path: &mut PathBuf, ext: &str) {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    *path = PathBuf::from(s);
}

/// Properties every asset gets from its raster before any layer applies.
fn native_metadata(ds: &dyn RasterDataset) -> Metadata {
    let gt = ds.geo_transform();
    let mut metadata = Map::new();
    metadata.insert("native-resolution".into(), json!([gt.pixel_width, gt.pixel_height]));
    metadata.insert("native-UL".into(), json!([gt.origin_x, gt.origin_y]));
    metadata.insert(
        "native-size".into(),
        json!([ds.band_count(), ds.width(), ds.height()]),
    );
    metadata.insert("native-projection".into(), json!(ds.projection()));
    metadata.insert("nodata".into(), json!(ds.band_nodata(1)));
    metadata
}

fn load_layer(path: &Path) -> StmapResult<MetadataLayer> {
    let text = fs::read_to_string(path)?;
    let parsed: serde_yaml::Value = serde_yaml::from_str(&text)
        .map_err(|e| StmapError::InvalidMetadata(format!("{}: {}", path.display(), e)))?;
    let values = match yaml_to_json(parsed) {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => {
            return Err(StmapError::InvalidMetadata(format!(
                "{}: top level must be a mapping",
                path.display()
            )))
        }
    };
    Ok(MetadataLayer {
        path: path.to_path_buf(),
        values,
    })
}

/// Shallow merge: each layer's keys replace earlier values wholesale.
pub fn merge_layers(base: Metadata, layers: &[MetadataLayer]) -> Metadata {
    layers.iter().fold(base, |mut merged, layer| {
        for (key, value) in &layer.values {
            merged.insert(key.clone(), value.clone());
        }
        merged
    })
}

/// Convert YAML to JSON, stringifying non-string mapping keys.
pub fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;
    match value {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!(i)
            } else if let Some(u) = n.as_u64() {
                json!(u)
            } else {
                n.as_f64().map_or(Value::Null, |f| json!(f))
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Y::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => match yaml_to_json(other) {
            Value::String(s) => s,
            v => v.to_string(),
        },
    }
}

/// A resolved asset: its raster, merged metadata and band dates.
///
/// The raster handle is owned by the asset and released when it drops.
pub struct Asset {
    pub name: String,
    /// Path of the raster on disk.
    pub path: PathBuf,
    pub(crate) dataset: Arc<dyn RasterDataset>,
    pub metadata: Metadata,
    pub band_index: BandIndex,
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asset")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("bands", &self.dataset.band_count())
            .field("projection", &self.dataset.projection())
            .finish()
    }
}

impl Asset {
    /// Build an asset around an already opened raster, with `metadata`
    /// layered over the native properties.
    pub fn from_dataset(
        name: impl Into<String>,
        dataset: Arc<dyn RasterDataset>,
        metadata: Metadata,
    ) -> StmapResult<Self> {
        let layer = MetadataLayer {
            path: PathBuf::new(),
            values: metadata,
        };
        let metadata = merge_layers(native_metadata(dataset.as_ref()), &[layer]);
        let band_index = BandIndex::from_metadata(metadata.get("band-dates"), dataset.band_count())?;
        Ok(Self {
            name: name.into(),
            path: PathBuf::new(),
            dataset,
            metadata,
            band_index,
        })
    }

    /// The raster currently backing the asset.
    pub fn dataset(&self) -> &dyn RasterDataset {
        self.dataset.as_ref()
    }

    /// Asset level no-data value from metadata.
    pub fn nodata(&self) -> Option<f64> {
        self.metadata.get("nodata").and_then(Value::as_f64)
    }

    /// The requested method if it names one, else the asset's
    /// `resample-method`, else nearest neighbour.
    pub fn resample_method(&self, requested: Option<&str>) -> ResampleMethod {
        requested
            .and_then(ResampleMethod::from_name)
            .or_else(|| {
                self.metadata
                    .get("resample-method")
                    .and_then(Value::as_str)
                    .and_then(ResampleMethod::from_name)
            })
            .unwrap_or_default()
    }

    /// First `<raster>_icon.<ext>` that exists next to the raster.
    pub fn icon_path(&self) -> Option<PathBuf> {
        let stem = self.path.with_extension("");
        ICON_EXTENSIONS.iter().find_map(|ext| {
            let mut candidate = stem.clone();
            let mut name = candidate.file_name()?.to_owned();
            name.push(format!("_icon.{}", ext));
            candidate.set_file_name(name);
            candidate.is_file().then_some(candidate)
        })
    }
}
