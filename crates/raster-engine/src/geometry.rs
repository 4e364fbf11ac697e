//! Region geometries parsed from GeoJSON or WKT.

use projection::CoordTransform;
use serde_json::Value;
use stmap_common::BoundingBox;

use crate::error::{RasterError, Result};

/// A closed sequence of vertices. The closing vertex may be repeated.
pub type Ring = Vec<(f64, f64)>;

/// A region of interest.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(f64, f64),
    /// Exterior ring followed by holes.
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Parse GeoJSON or WKT text. GML is not supported.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.starts_with('<') {
            return Err(RasterError::invalid_geometry("GML geometries are not supported"));
        }
        if text.starts_with('{') {
            let value: Value = serde_json::from_str(text)
                .map_err(|e| RasterError::invalid_geometry(format!("bad GeoJSON: {}", e)))?;
            return Self::from_geojson(&value);
        }
        Self::from_wkt(text)
    }

    /// Accepts geometries, a `Feature`, or a `FeatureCollection` with
    /// exactly one feature.
    pub fn from_geojson(value: &Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RasterError::invalid_geometry("GeoJSON object has no type"))?;

        match kind {
            "Feature" => {
                let geometry = value
                    .get("geometry")
                    .ok_or_else(|| RasterError::invalid_geometry("feature has no geometry"))?;
                Self::from_geojson(geometry)
            }
            "FeatureCollection" => match value.get("features").and_then(Value::as_array) {
                Some(features) if features.len() == 1 => Self::from_geojson(&features[0]),
                _ => Err(RasterError::invalid_geometry(
                    "feature collection must hold exactly one feature",
                )),
            },
            "Point" => {
                let (x, y) = json_position(coordinates(value)?)?;
                Ok(Geometry::Point(x, y))
            }
            "Polygon" => Ok(Geometry::Polygon(json_polygon(coordinates(value)?)?)),
            "MultiPolygon" => {
                let polygons = coordinates(value)?
                    .as_array()
                    .ok_or_else(|| RasterError::invalid_geometry("expected array of polygons"))?
                    .iter()
                    .map(json_polygon)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Geometry::MultiPolygon(polygons))
            }
            other => Err(RasterError::invalid_geometry(format!(
                "unsupported GeoJSON type {}",
                other
            ))),
        }
    }

    /// Parse `POINT`, `POLYGON` or `MULTIPOLYGON` WKT.
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let wkt = wkt.trim();
        let open = wkt
            .find('(')
            .ok_or_else(|| RasterError::invalid_geometry("WKT has no coordinates"))?;
        let tag = wkt[..open].trim().to_uppercase();
        let body = parse_parens(&wkt[open..])?;

        match tag.as_str() {
            "POINT" => {
                let ring = wkt_ring(&body)?;
                match ring.as_slice() {
                    [p] => Ok(Geometry::Point(p.0, p.1)),
                    _ => Err(RasterError::invalid_geometry("POINT needs one position")),
                }
            }
            "POLYGON" => Ok(Geometry::Polygon(wkt_polygon(&body)?)),
            "MULTIPOLYGON" => {
                let polygons = wkt_children(&body)?
                    .iter()
                    .map(wkt_polygon)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Geometry::MultiPolygon(polygons))
            }
            other => Err(RasterError::invalid_geometry(format!(
                "unsupported WKT geometry {}",
                other
            ))),
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Geometry::Point(..))
    }

    /// Polygons making up the geometry; empty for a point.
    pub fn polygons(&self) -> Vec<&[Ring]> {
        match self {
            Geometry::Point(..) => Vec::new(),
            Geometry::Polygon(rings) => vec![rings.as_slice()],
            Geometry::MultiPolygon(polys) => polys.iter().map(Vec::as_slice).collect(),
        }
    }

    fn vertices(&self) -> Box<dyn Iterator<Item = (f64, f64)> + '_> {
        match self {
            Geometry::Point(x, y) => Box::new(std::iter::once((*x, *y))),
            _ => Box::new(
                self.polygons()
                    .into_iter()
                    .flat_map(|rings| rings.iter().flatten().copied()),
            ),
        }
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.vertices())
    }

    /// Reproject every vertex.
    pub fn transformed(&self, transform: &CoordTransform) -> Self {
        let ring = |r: &Ring| -> Ring { r.iter().map(|p| transform.transform(p.0, p.1)).collect() };
        match self {
            Geometry::Point(x, y) => {
                let (x, y) = transform.transform(*x, *y);
                Geometry::Point(x, y)
            }
            Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(ring).collect()),
            Geometry::MultiPolygon(polys) => Geometry::MultiPolygon(
                polys
                    .iter()
                    .map(|rings| rings.iter().map(ring).collect())
                    .collect(),
            ),
        }
    }

    /// Point-in-geometry test using the even-odd rule within each polygon.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Geometry::Point(px, py) => *px == x && *py == y,
            _ => self
                .polygons()
                .into_iter()
                .any(|rings| rings_contain(rings, x, y)),
        }
    }
}

/// Ray casting over every ring of a polygon.
pub(crate) fn rings_contain(rings: &[Ring], x: f64, y: f64) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        if n < 3 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = ring[i];
            let (xj, yj) = ring[j];
            if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
                inside = !inside;
            }
            j = i;
        }
    }
    inside
}

fn coordinates(value: &Value) -> Result<&Value> {
    value
        .get("coordinates")
        .ok_or_else(|| RasterError::invalid_geometry("geometry has no coordinates"))
}

fn json_position(value: &Value) -> Result<(f64, f64)> {
    match value.as_array().map(Vec::as_slice) {
        Some([x, y, ..]) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(RasterError::invalid_geometry("position must be numeric")),
        },
        _ => Err(RasterError::invalid_geometry("position needs two numbers")),
    }
}

fn json_polygon(value: &Value) -> Result<Vec<Ring>> {
    let rings = value
        .as_array()
        .ok_or_else(|| RasterError::invalid_geometry("expected array of rings"))?;
    let rings = rings
        .iter()
        .map(|ring| {
            ring.as_array()
                .ok_or_else(|| RasterError::invalid_geometry("expected array of positions"))?
                .iter()
                .map(json_position)
                .collect::<Result<Ring>>()
        })
        .collect::<Result<Vec<_>>>()?;
    check_rings(rings)
}

fn check_rings(rings: Vec<Ring>) -> Result<Vec<Ring>> {
    if rings.is_empty() {
        return Err(RasterError::invalid_geometry("polygon has no rings"));
    }
    if rings.iter().any(|r| r.len() < 3) {
        return Err(RasterError::invalid_geometry("ring needs at least three positions"));
    }
    Ok(rings)
}

/// Parenthesised WKT structure: either nested groups or a coordinate list.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Group(Vec<Node>),
    Text(String),
}

/// Parse text starting with `(` into nested groups.
fn parse_parens(text: &str) -> Result<Node> {
    let mut stack: Vec<Vec<Node>> = Vec::new();
    let mut text_buf = String::new();
    let mut result = None;

    for ch in text.chars() {
        match ch {
            '(' => {
                if result.is_some() {
                    return Err(RasterError::invalid_geometry("trailing WKT after geometry"));
                }
                stack.push(Vec::new());
                text_buf.clear();
            }
            ')' => {
                let mut children = stack
                    .pop()
                    .ok_or_else(|| RasterError::invalid_geometry("unbalanced parentheses"))?;
                if children.is_empty() && !text_buf.trim().is_empty() {
                    children.push(Node::Text(text_buf.trim().to_string()));
                }
                text_buf.clear();
                let node = Node::Group(children);
                match stack.last_mut() {
                    Some(parent) => parent.push(node),
                    None => result = Some(node),
                }
            }
            _ if stack.is_empty() => {
                if !ch.is_whitespace() {
                    return Err(RasterError::invalid_geometry("trailing WKT after geometry"));
                }
            }
            _ => text_buf.push(ch),
        }
    }

    if !stack.is_empty() {
        return Err(RasterError::invalid_geometry("unbalanced parentheses"));
    }
    result.ok_or_else(|| RasterError::invalid_geometry("empty WKT"))
}

fn wkt_children(node: &Node) -> Result<&[Node]> {
    match node {
        Node::Group(children) if children.iter().all(|c| matches!(c, Node::Group(_))) => {
            Ok(children)
        }
        _ => Err(RasterError::invalid_geometry("expected nested WKT groups")),
    }
}

fn wkt_ring(node: &Node) -> Result<Ring> {
    let text = match node {
        Node::Group(children) => match children.as_slice() {
            [Node::Text(text)] => text,
            _ => return Err(RasterError::invalid_geometry("expected WKT coordinate list")),
        },
        Node::Text(text) => text,
    };

    text.split(',')
        .map(|pair| {
            let mut parts = pair.split_whitespace();
            let x = parts.next().and_then(|s| s.parse::<f64>().ok());
            let y = parts.next().and_then(|s| s.parse::<f64>().ok());
            match (x, y) {
                (Some(x), Some(y)) => Ok((x, y)),
                _ => Err(RasterError::invalid_geometry(format!(
                    "bad WKT position '{}'",
                    pair.trim()
                ))),
            }
        })
        .collect()
}

fn wkt_polygon(node: &Node) -> Result<Vec<Ring>> {
    let rings = wkt_children(node)?
        .iter()
        .map(wkt_ring)
        .collect::<Result<Vec<_>>>()?;
    check_rings(rings)
}
