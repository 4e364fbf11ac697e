//! Coordinate transforms between supported spatial references.

use crate::mercator::{lonlat_to_mercator, mercator_to_lonlat};
use crate::srs::SpatialRef;

/// Transform from one spatial reference into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordTransform {
    pub source: SpatialRef,
    pub target: SpatialRef,
}

impl CoordTransform {
    pub fn new(source: SpatialRef, target: SpatialRef) -> Self {
        Self { source, target }
    }

    /// The transform going the other way.
    pub fn inverse(&self) -> Self {
        Self::new(self.target, self.source)
    }

    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    /// Transform a single point.
    #[inline]
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        match (self.source, self.target) {
            (SpatialRef::Geographic, SpatialRef::WebMercator) => lonlat_to_mercator(x, y),
            (SpatialRef::WebMercator, SpatialRef::Geographic) => mercator_to_lonlat(x, y),
            _ => (x, y),
        }
    }

    /// Transform points in place.
    pub fn transform_points(&self, points: &mut [(f64, f64)]) {
        if self.is_identity() {
            return;
        }
        for p in points.iter_mut() {
            *p = self.transform(p.0, p.1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let t = CoordTransform::new(SpatialRef::WebMercator, SpatialRef::WebMercator);
        assert!(t.is_identity());
        assert_eq!(t.transform(12.5, -3.0), (12.5, -3.0));
    }

    #[test]
    fn test_inverse_round_trip() {
        let fwd = CoordTransform::new(SpatialRef::Geographic, SpatialRef::WebMercator);
        let mut pts = vec![(-123.0, 44.0), (10.0, -20.0)];
        fwd.transform_points(&mut pts);
        fwd.inverse().transform_points(&mut pts);
        assert!((pts[0].0 - -123.0).abs() < 1e-9);
        assert!((pts[1].1 - -20.0).abs() < 1e-9);
    }
}
