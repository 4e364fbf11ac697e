//! Flat key/value calls and their parameters.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use projection::WEB_MERCATOR_WKT;
use serde_json::{json, Value};
use stmap_common::{tile_bounds, DateSelector, StmapError, StmapResult};

use crate::asset::yaml_to_json;

/// Tile edge in pixels for tile requests.
pub const TILE_SIZE: usize = 256;

/// A request: an operation name plus parameters, keys lower-cased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Call {
    params: BTreeMap<String, Value>,
}

impl Call {
    /// Build from string pairs such as a query string.
    pub fn from_pairs<I, K, V>(pairs: I) -> StmapResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let params = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), Value::String(v.into())))
            .collect();
        Self::normalize(params)
    }

    /// Build from a JSON object.
    pub fn from_value(value: Value) -> StmapResult<Self> {
        match value {
            Value::Object(map) => Self::normalize(map.into_iter().collect()),
            other => Err(StmapError::invalid_parameter(
                "request",
                format!("expected an object, got {}", other),
            )),
        }
    }

    /// Lower-case the keys. A call whose only key is `json` or `yaml` is
    /// replaced by the document it carries.
    fn normalize(raw: BTreeMap<String, Value>) -> StmapResult<Self> {
        let mut params: BTreeMap<String, Value> =
            raw.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();

        if params.len() == 1 {
            if let Some(doc) = params.get("json").cloned() {
                let expanded = match doc {
                    Value::String(text) => serde_json::from_str(&text)
                        .map_err(|e| StmapError::invalid_parameter("json", e.to_string()))?,
                    other => other,
                };
                return Self::from_value(expanded);
            }
            if let Some(doc) = params.get("yaml").cloned() {
                let text = match doc {
                    Value::String(text) => text,
                    other => {
                        return Err(StmapError::invalid_parameter(
                            "yaml",
                            format!("expected a YAML document as text, got {}", other),
                        ))
                    }
                };
                let parsed: serde_yaml::Value = serde_yaml::from_str(&text)
                    .map_err(|e| StmapError::invalid_parameter("yaml", e.to_string()))?;
                return Self::from_value(yaml_to_json(parsed));
            }
        }

        params.retain(|_, v| !matches!(v, Value::Null));
        Ok(Self { params })
    }

    /// The `window` call that draws TMS tile `(x, y)` at `zoom`.
    pub fn tile(asset: &str, date: &str, zoom: u32, x: u32, y: u32) -> Self {
        let bounds = tile_bounds(x, y, zoom);
        let mut call = Self::default();
        call.insert("operation", json!("window"));
        call.insert("asset", json!(asset));
        call.insert("date", json!(date));
        call.insert(
            "window",
            json!([bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y]),
        );
        call.insert("srs", json!(WEB_MERCATOR_WKT));
        call.insert("srs_type", json!("wkt"));
        call.insert("window_size", json!([TILE_SIZE, TILE_SIZE]));
        call.insert("output", json!("png"));
        call
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.params.insert(key.to_lowercase(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// A parameter as text. Empty strings count as absent; structured
    /// values come back as JSON text.
    pub fn str_param(&self, key: &str) -> Option<String> {
        match self.params.get(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn required_str(&self, key: &str) -> StmapResult<String> {
        self.str_param(key)
            .ok_or_else(|| StmapError::missing_parameter(key))
    }

    pub fn operation_name(&self) -> StmapResult<String> {
        self.required_str("operation").map(|s| s.to_lowercase())
    }

    /// A list parameter: a JSON/YAML array, or comma separated text.
    pub fn list_param(&self, key: &str) -> StmapResult<Option<Vec<Value>>> {
        let Some(value) = self.params.get(key) else {
            return Ok(None);
        };
        match value {
            Value::Null => Ok(None),
            Value::Array(items) => Ok(Some(items.clone())),
            Value::String(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                if text.starts_with('[') {
                    let parsed: serde_yaml::Value = serde_yaml::from_str(text)
                        .map_err(|e| StmapError::invalid_parameter(key, e.to_string()))?;
                    return match yaml_to_json(parsed) {
                        Value::Array(items) => Ok(Some(items)),
                        _ => Err(StmapError::invalid_parameter(key, "expected a list")),
                    };
                }
                Ok(Some(
                    text.split(',')
                        .map(|s| Value::String(s.trim().to_string()))
                        .collect(),
                ))
            }
            other => Ok(Some(vec![other.clone()])),
        }
    }

    /// A list of exactly `len` numbers.
    pub fn numbers(&self, key: &str, len: usize) -> StmapResult<Option<Vec<f64>>> {
        let Some(items) = self.list_param(key)? else {
            return Ok(None);
        };
        if items.len() != len {
            return Err(StmapError::invalid_parameter(
                key,
                format!("expected {} numbers, got {}", len, items.len()),
            ));
        }
        items
            .iter()
            .map(|item| {
                let n = match item {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                };
                n.filter(|v| v.is_finite())
                    .ok_or_else(|| StmapError::invalid_parameter(key, format!("'{}' is not a number", item)))
            })
            .collect::<StmapResult<Vec<_>>>()
            .map(Some)
    }

    /// A list of names.
    pub fn names(&self, key: &str) -> StmapResult<Option<Vec<String>>> {
        Ok(self.list_param(key)?.map(|items| {
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .filter(|s| !s.is_empty())
                .collect()
        }))
    }

    /// The `date` parameter as a band selector.
    pub fn date_selector(&self) -> StmapResult<Option<DateSelector>> {
        let text = match self.params.get("date") {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(items)) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            Some(_) => match self.str_param("date") {
                Some(text) => text,
                None => return Ok(None),
            },
        };
        DateSelector::parse(&text)
            .map(Some)
            .map_err(|e| StmapError::invalid_parameter("date", e.to_string()))
    }

    /// Stable key identifying this call: the operation and its sorted
    /// arguments, hashed.
    pub fn cache_key(&self) -> String {
        let mut hasher = DefaultHasher::new();
        for (key, value) in &self.params {
            key.hash(&mut hasher);
            value.to_string().hash(&mut hasher);
        }
        format!("{:016x}", hasher.finish())
    }
}
