//! Encoding results for the wire.
//!
//! The content type of an encoded body is sniffed from its bytes rather
//! than taken from the requested format.

use std::borrow::Cow;

use ndarray::ArrayView2;
use renderer::{render_png, Palette, RenderStyle, Scaling};
use serde::Serialize;
use serde_json::Value;
use stmap_common::{StmapError, StmapResult};
use tracing::{debug, warn};

use crate::asset::Metadata;
use crate::masked::MaskedArray;

pub const CONTENT_TYPE_PNG: &str = "image/png";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub const CONTENT_TYPE_BINARY: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Msgpack,
    /// Hand the value back without serialising it.
    Raw,
    Png,
}

impl OutputFormat {
    /// Look up a format name. Unknown names fall back to JSON.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            "msgpack" | "messagepack" => Self::Msgpack,
            "raw" => Self::Raw,
            "png" => Self::Png,
            other => {
                warn!(format = other, "unknown output format, using json");
                Self::Json
            }
        }
    }
}

/// A result before encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Array(MaskedArray),
    Document(Value),
}

/// What an operation hands back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Encoded {
        body: Vec<u8>,
        content_type: &'static str,
    },
    /// Unserialised result for in-process callers.
    Raw(Payload),
}

impl Response {
    /// Wrap encoded bytes, sniffing their content type.
    pub fn bytes(body: Vec<u8>) -> Self {
        let content_type = sniff_content_type(&body);
        Response::Encoded { body, content_type }
    }

    /// Bytes and content type, encoding raw results as JSON.
    pub fn into_encoded(self) -> StmapResult<(Vec<u8>, &'static str)> {
        match self {
            Response::Encoded { body, content_type } => Ok((body, content_type)),
            Response::Raw(payload) => {
                let body = serde_json::to_vec(&payload)?;
                Ok((body, CONTENT_TYPE_JSON))
            }
        }
    }
}

/// Encode `payload` as `format`. `metadata` supplies the legend or
/// grayscale scaling for PNG output.
pub fn encode(format: OutputFormat, payload: Payload, metadata: Option<&Metadata>) -> StmapResult<Response> {
    let body = match format {
        OutputFormat::Raw => return Ok(Response::Raw(payload)),
        OutputFormat::Json => serde_json::to_vec(&payload)?,
        OutputFormat::Yaml => serde_yaml::to_string(&payload)
            .map_err(|e| StmapError::EncodeError(format!("yaml: {}", e)))?
            .into_bytes(),
        OutputFormat::Msgpack => {
            rmp_serde::to_vec(&payload).map_err(|e| StmapError::EncodeError(format!("msgpack: {}", e)))?
        }
        OutputFormat::Png => match &payload {
            Payload::Array(array) => encode_png(array, metadata)?,
            Payload::Document(_) => {
                return Err(StmapError::invalid_parameter(
                    "output",
                    "png output needs a raster result",
                ))
            }
        },
    };

    let response = Response::bytes(body);
    if let Response::Encoded { body, content_type } = &response {
        debug!(?format, bytes = body.len(), content_type, "encoded response");
    }
    Ok(response)
}

/// How an asset's metadata asks for its rasters to be drawn: its `legend`
/// if it has one, else grayscale over `map-scaling` or the data range.
pub fn render_style(metadata: Option<&Metadata>) -> StmapResult<RenderStyle> {
    let Some(metadata) = metadata else {
        return Ok(RenderStyle::Grayscale(None));
    };

    if let Some(legend) = metadata.get("legend").filter(|v| !v.is_null()) {
        let palette = Palette::from_legend(legend)
            .map_err(|e| StmapError::InvalidMetadata(format!("legend: {}", e)))?;
        return Ok(RenderStyle::Legend(palette));
    }

    let scaling = match metadata.get("map-scaling") {
        None | Some(Value::Null) => None,
        Some(Value::Object(range)) => {
            let bound = |key: &str| range.get(key).and_then(Value::as_f64);
            match (bound("min"), bound("max")) {
                (Some(min), Some(max)) => Some(Scaling::new(min, max)),
                _ => return Err(StmapError::InvalidMetadata("map-scaling needs min and max".into())),
            }
        }
        Some(Value::Array(range)) => match range.as_slice() {
            [min, max] => match (min.as_f64(), max.as_f64()) {
                (Some(min), Some(max)) => Some(Scaling::new(min, max)),
                _ => return Err(StmapError::InvalidMetadata("map-scaling must be numeric".into())),
            },
            _ => return Err(StmapError::InvalidMetadata("map-scaling needs [min, max]".into())),
        },
        Some(other) => {
            return Err(StmapError::InvalidMetadata(format!("invalid map-scaling {}", other)))
        }
    };
    Ok(RenderStyle::Grayscale(scaling))
}

/// Draw the first band of `array`.
pub fn encode_png(array: &MaskedArray, metadata: Option<&Metadata>) -> StmapResult<Vec<u8>> {
    let (bands, rows, cols) = array.dim();
    if bands == 0 || rows == 0 || cols == 0 {
        return Err(StmapError::EncodeError(format!(
            "cannot draw an empty {}x{}x{} array",
            bands, rows, cols
        )));
    }

    let style = render_style(metadata)?;
    let (values, mask) = array.band(0);
    let values = contiguous(&values);
    let mask = contiguous(&mask);

    render_png(&values, &mask, cols, rows, &style).map_err(|e| StmapError::EncodeError(e.to_string()))
}

/// Row-major slice of a band, copied only when the view is not in
/// standard layout.
fn contiguous<'a, T: Copy>(view: &'a ArrayView2<'_, T>) -> Cow<'a, [T]> {
    match view.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(view.iter().copied().collect()),
    }
}

/// Content type from the leading bytes of `body`.
pub fn sniff_content_type(body: &[u8]) -> &'static str {
    if body.starts_with(renderer::png::PNG_SIGNATURE.as_slice()) {
        return CONTENT_TYPE_PNG;
    }
    if body.starts_with(b"GIF87a") || body.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if body.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    // "BM", file size, then four reserved zero bytes
    if body.len() >= 14 && body.starts_with(b"BM") && body[6..10] == [0, 0, 0, 0] {
        return "image/bmp";
    }
    if matches!(
        serde_json::from_slice::<Value>(body),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    ) {
        return CONTENT_TYPE_JSON;
    }
    if std::str::from_utf8(body).is_ok() {
        return CONTENT_TYPE_TEXT;
    }
    CONTENT_TYPE_BINARY
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    fn array() -> MaskedArray {
        MaskedArray::from_data(array![[[1.0, 2.0], [-1.0, 4.0]]], |v| v == -1.0)
    }

    fn metadata(value: Value) -> Metadata {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_unknown_format_is_json() {
        assert_eq!(OutputFormat::from_name("YAML"), OutputFormat::Yaml);
        assert_eq!(OutputFormat::from_name("tiff"), OutputFormat::Json);
    }

    #[test]
    fn test_json_nulls_masked_cells() {
        let response = encode(OutputFormat::Json, Payload::Array(array()), None).unwrap();
        let (body, content_type) = response.into_encoded().unwrap();
        assert_eq!(content_type, CONTENT_TYPE_JSON);
        assert_eq!(String::from_utf8(body).unwrap(), "[[[1.0,2.0],[null,4.0]]]");
    }

    #[test]
    fn test_yaml_and_msgpack() {
        let doc = Payload::Document(json!({"a": [1, 2]}));
        let (yaml, ct) = encode(OutputFormat::Yaml, doc.clone(), None).unwrap().into_encoded().unwrap();
        assert_eq!(ct, CONTENT_TYPE_TEXT);
        let back: Value = serde_yaml::from_slice(&yaml).unwrap();
        assert_eq!(back, json!({"a": [1, 2]}));

        let (packed, ct) = encode(OutputFormat::Msgpack, doc, None).unwrap().into_encoded().unwrap();
        assert_eq!(ct, CONTENT_TYPE_BINARY);
        let back: Value = rmp_serde::from_slice(&packed).unwrap();
        assert_eq!(back, json!({"a": [1, 2]}));
    }

    #[test]
    fn test_raw_passthrough() {
        let response = encode(OutputFormat::Raw, Payload::Array(array()), None).unwrap();
        assert_eq!(response, Response::Raw(Payload::Array(array())));
    }

    #[test]
    fn test_png_needs_an_array() {
        let err = encode(OutputFormat::Png, Payload::Document(json!([])), None).unwrap_err();
        assert_eq!(err.kind(), "InvalidParameters");
    }

    #[test]
    fn test_render_style_from_metadata() {
        let legend = metadata(json!({"legend": {"1": ["Land", "#00FF00"]}}));
        assert!(matches!(render_style(Some(&legend)).unwrap(), RenderStyle::Legend(_)));

        let scaled = metadata(json!({"map-scaling": {"min": 0, "max": 10}}));
        assert_eq!(
            render_style(Some(&scaled)).unwrap(),
            RenderStyle::Grayscale(Some(Scaling::new(0.0, 10.0)))
        );

        assert_eq!(render_style(None).unwrap(), RenderStyle::Grayscale(None));
        let bad = metadata(json!({"map-scaling": "wide"}));
        assert!(render_style(Some(&bad)).is_err());
    }

    #[test]
    fn test_png_is_sniffed() {
        let (body, ct) = encode(OutputFormat::Png, Payload::Array(array()), None)
            .unwrap()
            .into_encoded()
            .unwrap();
        assert_eq!(ct, CONTENT_TYPE_PNG);
        assert!(body.starts_with(&renderer::png::PNG_SIGNATURE));
    }

    #[test]
    fn test_png_same_for_any_memory_layout() {
        let data = array![[[1.0, 2.0, 3.0], [4.0, -1.0, 6.0]]];
        let transposed = data.clone().permuted_axes([0, 2, 1]);
        assert!(!transposed.is_standard_layout());

        let strided = MaskedArray::from_data(transposed.clone(), |v| v == -1.0);
        let standard =
            MaskedArray::from_data(transposed.as_standard_layout().into_owned(), |v| v == -1.0);
        assert_eq!(
            encode_png(&strided, None).unwrap(),
            encode_png(&standard, None).unwrap()
        );

        let borrowed = standard.band(0);
        assert!(matches!(contiguous(&borrowed.0), Cow::Borrowed(_)));
        assert!(matches!(contiguous(&strided.band(0).0), Cow::Owned(_)));
    }

    #[test]
    fn test_sniffing() {
        assert_eq!(sniff_content_type(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_content_type(b"BMI: 22\nname: x\n"), CONTENT_TYPE_TEXT);
        assert_eq!(sniff_content_type(b"{\"a\": 1}"), CONTENT_TYPE_JSON);
        assert_eq!(sniff_content_type(b"- a\n- b\n"), CONTENT_TYPE_TEXT);
        assert_eq!(sniff_content_type(&[0x92, 0x01, 0x02]), CONTENT_TYPE_BINARY);
    }
}
