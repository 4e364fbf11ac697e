//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic or projected bounding box.
///
/// Coordinates are in the units of whatever spatial reference the box was
/// expressed in: degrees for geographic references, meters for Web Mercator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build a bounding box from a `[minx, miny, maxx, maxy]` slice.
    pub fn from_slice(values: &[f64]) -> Result<Self, BboxParseError> {
        match values {
            [min_x, min_y, max_x, max_y] => {
                let bbox = Self::new(*min_x, *min_y, *max_x, *max_y);
                bbox.check()?;
                Ok(bbox)
            }
            _ => Err(BboxParseError::InvalidFormat(format!("{:?}", values))),
        }
    }

    /// Parse a comma separated string: "minx,miny,maxx,maxy"
    pub fn from_comma_string(s: &str) -> Result<Self, BboxParseError> {
        let values = s
            .trim_matches(|c| c == '[' || c == ']' || c == '(' || c == ')')
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .map_err(|_| BboxParseError::InvalidNumber(part.trim().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_slice(&values).map_err(|_| BboxParseError::InvalidFormat(s.to_string()))
    }

    /// Smallest box containing every point, or `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = Self::new(x, y, x, y);
        for (x, y) in iter {
            bbox.expand_to_include(x, y);
        }
        Some(bbox)
    }

    fn check(&self) -> Result<(), BboxParseError> {
        let finite = [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(BboxParseError::Inverted(*self));
        }
        Ok(())
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow the box so it contains the given point.
    pub fn expand_to_include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bounds format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in bounds: {0}")]
    InvalidNumber(String),

    #[error("Bounds are inverted or not finite: {0:?}")]
    Inverted(BoundingBox),
}
