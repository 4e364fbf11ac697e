//! Request regions: a geometry plus the reference it is expressed in.

use projection::{CoordTransform, SpatialRef};
use raster_engine::Geometry;
use serde_json::Value;
use stmap_common::{StmapError, StmapResult};

/// Encoding of the `region` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionFormat {
    #[default]
    Json,
    Wkt,
}

impl RegionFormat {
    pub fn from_name(name: &str) -> StmapResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "" | "json" | "geojson" => Ok(Self::Json),
            "wkt" => Ok(Self::Wkt),
            "gml" => Err(StmapError::invalid_parameter(
                "region_type",
                "GML regions are not supported",
            )),
            other => Err(StmapError::invalid_parameter(
                "region_type",
                format!("unknown region type '{}'", other),
            )),
        }
    }
}

/// A geometry with an optional spatial reference. Without one the
/// geometry is taken to be in the raster's reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub geometry: Geometry,
    pub srs: Option<SpatialRef>,
}

impl Region {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry, srs: None }
    }

    pub fn parse(text: &str, format: RegionFormat) -> StmapResult<Self> {
        let geometry = match format {
            RegionFormat::Json => {
                let value: Value = serde_json::from_str(text.trim())
                    .map_err(|e| StmapError::invalid_parameter("region", format!("bad GeoJSON: {}", e)))?;
                Geometry::from_geojson(&value)?
            }
            RegionFormat::Wkt => Geometry::from_wkt(text)?,
        };
        Ok(Self::new(geometry))
    }

    pub fn with_srs(mut self, srs: SpatialRef) -> Self {
        self.srs = Some(srs);
        self
    }

    pub fn is_point(&self) -> bool {
        self.geometry.is_point()
    }

    /// The geometry in the reference named by `raster_projection`.
    pub fn to_raster_space(&self, raster_projection: &str) -> StmapResult<Geometry> {
        let Some(source) = self.srs else {
            return Ok(self.geometry.clone());
        };
        let target = SpatialRef::from_user_input(raster_projection)
            .map_err(|e| StmapError::ReprojectionFailure(e.to_string()))?;
        Ok(self.geometry.transformed(&CoordTransform::new(source, target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::WGS84_WKT;

    #[test]
    fn test_region_formats() {
        assert_eq!(RegionFormat::from_name("JSON").unwrap(), RegionFormat::Json);
        assert_eq!(RegionFormat::from_name("wkt").unwrap(), RegionFormat::Wkt);
        assert!(RegionFormat::from_name("gml").is_err());
        assert!(RegionFormat::from_name("kml").is_err());
    }

    #[test]
    fn test_parse_geojson_and_wkt() {
        let json = Region::parse(r#"{"type":"Point","coordinates":[1.5,2.5]}"#, RegionFormat::Json).unwrap();
        assert_eq!(json.geometry, Geometry::Point(1.5, 2.5));
        assert!(json.is_point());

        let wkt = Region::parse("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))", RegionFormat::Wkt).unwrap();
        assert!(!wkt.is_point());
        assert!(Region::parse("POINT(1 2)", RegionFormat::Json).is_err());
    }

    #[test]
    fn test_reprojection_into_raster_space() {
        let region = Region::new(Geometry::Point(0.0, 0.0)).with_srs(SpatialRef::WebMercator);
        assert_eq!(region.to_raster_space(WGS84_WKT).unwrap(), Geometry::Point(0.0, 0.0));

        let region = Region::new(Geometry::Point(20037508.342789244, 0.0)).with_srs(SpatialRef::WebMercator);
        match region.to_raster_space("EPSG:4326").unwrap() {
            Geometry::Point(x, y) => {
                assert!((x - 180.0).abs() < 1e-9);
                assert!(y.abs() < 1e-9);
            }
            other => panic!("unexpected geometry {:?}", other),
        }

        assert!(matches!(
            region.to_raster_space("LOCAL_CS[\"nowhere\"]"),
            Err(StmapError::ReprojectionFailure(_))
        ));
    }

    #[test]
    fn test_unreferenced_region_is_untouched() {
        let region = Region::new(Geometry::Point(5.0, 6.0));
        assert_eq!(region.to_raster_space("").unwrap(), Geometry::Point(5.0, 6.0));
    }
}
