//! Operation dispatch.
//!
//! Every call names an [`Operation`]; its parameters are read from the
//! call, the pipeline runs synchronously, and the encoded result comes
//! back as a [`Response`].
//!
//! ```text
//! Call ──▶ AssetResolver::resolve ──▶ [Asset::warp_to] ──▶ get_window / get_region
//!                                                              │
//!                          Response ◀── encode ◀── [reduce] ◀──┘
//! ```

use std::fmt;
use std::fs;

use projection::{SpatialRef, SrsType};
use rand::Rng;
use serde_json::Value;
use stmap_common::{BoundingBox, StmapError, StmapResult};
use tracing::{info, instrument};

use crate::asset::{Asset, AssetResolver};
use crate::config::CoreConfig;
use crate::extract::Coverage;
use crate::output::{encode, OutputFormat, Payload, Response};
use crate::reducers::{reduce, Reducer};
use crate::region::{Region, RegionFormat};
use crate::request::Call;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Names of every asset.
    List,
    /// Merged metadata of one asset.
    Info,
    /// The asset's icon image.
    Icon,
    /// Pixels inside a bounding box, resampled to a fixed size.
    Window,
    /// Pixels inside a point or polygon at native resolution.
    Regions,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::List,
        Operation::Info,
        Operation::Icon,
        Operation::Window,
        Operation::Regions,
    ];

    pub fn from_name(name: &str) -> StmapResult<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == name.trim().to_lowercase())
            .ok_or_else(|| StmapError::UnknownOperation(name.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Info => "info",
            Operation::Icon => "icon",
            Operation::Window => "window",
            Operation::Regions => "regions",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs calls against the assets under a data root.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    resolver: AssetResolver,
}

impl Dispatcher {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            resolver: AssetResolver::new(&config.data_path),
        }
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    /// Run `call` with the thread's random generator.
    pub fn dispatch(&self, call: &Call) -> StmapResult<Response> {
        self.dispatch_with_rng(call, &mut rand::thread_rng())
    }

    /// Run `call`, drawing `random` reducer samples from `rng`.
    #[instrument(level = "info", skip_all, fields(operation = tracing::field::Empty))]
    pub fn dispatch_with_rng<R: Rng + ?Sized>(&self, call: &Call, rng: &mut R) -> StmapResult<Response> {
        let operation = Operation::from_name(&call.operation_name()?)?;
        tracing::Span::current().record("operation", operation.as_str());

        let response = match operation {
            Operation::List => self.list(call),
            Operation::Info => self.info(call),
            Operation::Icon => self.icon(call),
            Operation::Window => self.window(call, rng),
            Operation::Regions => self.regions(call, rng),
        }?;

        if let Response::Encoded { body, content_type } = &response {
            info!(bytes = body.len(), content_type, "operation complete");
        }
        Ok(response)
    }

    fn list(&self, call: &Call) -> StmapResult<Response> {
        let format = output_format(call, "yaml");
        let names = self.resolver.list()?;
        encode(format, Payload::Document(Value::from(names)), None)
    }

    fn info(&self, call: &Call) -> StmapResult<Response> {
        let format = output_format(call, "yaml");
        let asset = self.resolver.resolve(&call.required_str("asset")?)?;
        let mut info = asset.metadata.clone();
        if info.contains_key("band-dates") {
            info.insert("band-dates".into(), Value::Object(asset.band_index.to_iso_map()));
        }
        encode(format, Payload::Document(Value::Object(info)), None)
    }

    fn icon(&self, call: &Call) -> StmapResult<Response> {
        let name = call.required_str("asset")?;
        let asset = self.resolver.resolve(&name)?;
        let path = asset
            .icon_path()
            .ok_or_else(|| StmapError::AssetNotFound(format!("{} has no icon", name)))?;
        Ok(Response::bytes(fs::read(path)?))
    }

    fn window<R: Rng + ?Sized>(&self, call: &Call, rng: &mut R) -> StmapResult<Response> {
        let format = output_format(call, "png");
        let window = call
            .numbers("window", 4)?
            .ok_or_else(|| StmapError::missing_parameter("window"))?;
        let bounds = BoundingBox::from_slice(&window)
            .map_err(|e| StmapError::invalid_parameter("window", e.to_string()))?;
        let size = call
            .numbers("window_size", 2)?
            .ok_or_else(|| StmapError::missing_parameter("window_size"))?;
        let size = (pixel_count(size[0])?, pixel_count(size[1])?);
        let selector = call
            .date_selector()?
            .ok_or_else(|| StmapError::missing_parameter("date"))?;

        let asset = self.prepare_asset(call)?;
        let method = asset.resample_method(call.str_param("resample").as_deref());
        let mut data = asset.get_window(&bounds, Some(&selector), size, method)?;

        if let Some(reducers) = reducers(call)? {
            data = reduce(&reducers, data, None, rng)?;
        }
        encode(format, Payload::Array(data), Some(&asset.metadata))
    }

    fn regions<R: Rng + ?Sized>(&self, call: &Call, rng: &mut R) -> StmapResult<Response> {
        let format = output_format(call, "json");
        let region_format = RegionFormat::from_name(&call.str_param("region_type").unwrap_or_default())?;
        let mut region = Region::parse(&call.required_str("region")?, region_format)?;
        if let Some(srs) = call.str_param("region_srs") {
            region = region.with_srs(parse_srs(&srs, call.str_param("region_srs_type"), "region_srs")?);
        }
        let coverage = Coverage::from_name(&call.str_param("coverage").unwrap_or_default())?;
        let selector = call.date_selector()?;

        let asset = self.prepare_asset(call)?;
        let method = asset.resample_method(call.str_param("resample").as_deref());
        let extracted = asset.get_region(&region, selector.as_ref(), method, coverage)?;

        let mut data = extracted.data;
        if let Some(reducers) = reducers(call)? {
            data = reduce(&reducers, data, extracted.weights.as_ref(), rng)?;
        }
        encode(format, Payload::Array(data), Some(&asset.metadata))
    }

    /// Resolve the call's asset, reprojected when it asks for an `srs`.
    fn prepare_asset(&self, call: &Call) -> StmapResult<Asset> {
        let asset = self.resolver.resolve(&call.required_str("asset")?)?;
        match call.str_param("srs") {
            Some(srs) => {
                let target = parse_srs(&srs, call.str_param("srs_type"), "srs")?;
                let method = asset.resample_method(call.str_param("resample").as_deref());
                asset.warp_to(&target, method)
            }
            None => Ok(asset),
        }
    }
}

fn output_format(call: &Call, default: &str) -> OutputFormat {
    OutputFormat::from_name(&call.str_param("output").unwrap_or_else(|| default.to_string()))
}

fn reducers(call: &Call) -> StmapResult<Option<Vec<Reducer>>> {
    match call.names("reducers")? {
        Some(names) if !names.is_empty() => Reducer::parse_list(&names).map(Some),
        _ => Ok(None),
    }
}

fn parse_srs(definition: &str, srs_type: Option<String>, param: &str) -> StmapResult<SpatialRef> {
    let srs_type = SrsType::from_str(srs_type.as_deref().unwrap_or("unknown"))
        .map_err(|e| StmapError::invalid_parameter(format!("{}_type", param), e.to_string()))?;
    SpatialRef::parse(definition, srs_type).map_err(|e| StmapError::ReprojectionFailure(e.to_string()))
}

fn pixel_count(value: f64) -> StmapResult<usize> {
    if value >= 1.0 && value.fract() == 0.0 && value <= 16384.0 {
        Ok(value as usize)
    } else {
        Err(StmapError::invalid_parameter(
            "window_size",
            format!("{} is not a pixel count in 1..=16384", value),
        ))
    }
}
