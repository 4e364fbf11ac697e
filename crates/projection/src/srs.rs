//! Spatial reference definitions.

use std::fmt;

use tracing::debug;

use crate::error::{ProjectionError, Result};

/// WKT for geographic WGS84 (EPSG:4326).
pub const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]"#;

/// WKT for spherical Web Mercator (EPSG:3857), as used by tile clients.
pub const WEB_MERCATOR_WKT: &str = r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Mercator_1SP"],PARAMETER["central_meridian",0],PARAMETER["scale_factor",1],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["X",EAST],AXIS["Y",NORTH],EXTENSION["PROJ4","+proj=merc +a=6378137 +b=6378137 +lat_ts=0.0 +lon_0=0.0 +x_0=0.0 +y_0=0 +k=1.0 +units=m +nadgrids=@null +wktext +no_defs"],AUTHORITY["EPSG","3857"]]"#;

/// A supported spatial reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialRef {
    /// WGS84 longitude/latitude in degrees
    Geographic,
    /// Spherical Web Mercator in meters
    WebMercator,
}

/// Format tag accompanying a spatial reference definition in requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrsType {
    Wkt,
    Proj4,
    Epsg,
    /// Guess from the text itself.
    Unknown,
}

impl SrsType {
    /// Parse a request `*_srs_type` value. ESRI `.prj` text is WKT.
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "wkt" | "esri" | "prj" => Ok(SrsType::Wkt),
            "proj4" => Ok(SrsType::Proj4),
            "epsg" => Ok(SrsType::Epsg),
            "unknown" | "" => Ok(SrsType::Unknown),
            other => Err(ProjectionError::UnsupportedType(other.to_string())),
        }
    }
}

impl SpatialRef {
    /// Parse a definition tagged with its format.
    pub fn parse(input: &str, srs_type: SrsType) -> Result<Self> {
        let input = input.trim();
        match srs_type {
            SrsType::Wkt => Self::from_wkt(input),
            SrsType::Proj4 => Self::from_proj4(input),
            SrsType::Epsg => {
                let code = input.rsplit(':').next().unwrap_or(input).trim();
                let code = code
                    .parse::<u32>()
                    .map_err(|_| ProjectionError::unrecognised(input))?;
                Self::from_epsg(code)
            }
            SrsType::Unknown => Self::from_user_input(input),
        }
    }

    /// Look up a supported EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            4326 => Ok(SpatialRef::Geographic),
            3857 | 900913 | 3785 | 102100 | 102113 => Ok(SpatialRef::WebMercator),
            other => Err(ProjectionError::UnsupportedEpsg(other)),
        }
    }

    /// Interpret WKT (WKT1 `AUTHORITY` or WKT2 `ID` tagged, or recognisable
    /// by projection name).
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let upper = wkt.to_uppercase();

        // The outermost node's authority is written last
        if let Some(code) = last_epsg_authority(&upper) {
            debug!(code, "WKT carries EPSG authority");
            return Self::from_epsg(code);
        }

        let is_projected = upper.starts_with("PROJCS") || upper.starts_with("PROJCRS");
        let is_geographic = upper.starts_with("GEOGCS")
            || upper.starts_with("GEOGCRS")
            || upper.starts_with("GEODCRS");

        if is_projected {
            let spherical = upper.contains("PSEUDO-MERCATOR")
                || upper.contains("PSEUDO_MERCATOR")
                || upper.contains("POPULAR VISUALISATION")
                || upper.contains("+A=6378137 +B=6378137");
            if spherical && upper.contains("MERCATOR") {
                return Ok(SpatialRef::WebMercator);
            }
        } else if is_geographic && upper.contains("WGS") {
            return Ok(SpatialRef::Geographic);
        }

        Err(ProjectionError::unrecognised(wkt))
    }

    /// Interpret a PROJ.4 string.
    pub fn from_proj4(proj4: &str) -> Result<Self> {
        let lower = proj4.to_lowercase();
        let params: Vec<&str> = lower.split_whitespace().collect();
        let has = |p: &str| params.iter().any(|q| *q == p);

        if let Some(code) = params
            .iter()
            .find_map(|p| p.strip_prefix("+init=epsg:"))
            .and_then(|c| c.parse::<u32>().ok())
        {
            return Self::from_epsg(code);
        }

        if has("+proj=longlat") || has("+proj=latlong") || has("+proj=lonlat") {
            return Ok(SpatialRef::Geographic);
        }

        let spherical = (has("+a=6378137") && has("+b=6378137")) || has("+r=6378137");
        if has("+proj=merc") && spherical {
            return Ok(SpatialRef::WebMercator);
        }

        Err(ProjectionError::unrecognised(proj4))
    }

    /// Guess the format of free-form input.
    ///
    /// Accepts `EPSG:####`, bare codes, OGC URNs, `CRS:84`, `WGS84`, PROJ.4
    /// strings and WKT.
    pub fn from_user_input(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let upper = trimmed.to_uppercase();

        if upper == "CRS:84" || upper == "WGS84" || upper == "OGC:CRS84" {
            return Ok(SpatialRef::Geographic);
        }
        if let Some(code) = upper.strip_prefix("EPSG:") {
            return Self::parse(code, SrsType::Epsg);
        }
        if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            return Self::parse(trimmed, SrsType::Epsg);
        }
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Self::parse(trimmed, SrsType::Epsg);
        }
        if trimmed.starts_with('+') {
            return Self::from_proj4(trimmed);
        }
        Self::from_wkt(trimmed)
    }

    /// Canonical WKT for this reference.
    pub fn to_wkt(&self) -> &'static str {
        match self {
            SpatialRef::Geographic => WGS84_WKT,
            SpatialRef::WebMercator => WEB_MERCATOR_WKT,
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            SpatialRef::Geographic => 4326,
            SpatialRef::WebMercator => 3857,
        }
    }

    /// Check if this is a geographic (lon/lat) reference.
    pub fn is_geographic(&self) -> bool {
        matches!(self, SpatialRef::Geographic)
    }
}

impl fmt::Display for SpatialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Find the EPSG code of the last `AUTHORITY["EPSG","n"]` or `ID["EPSG",n]`.
fn last_epsg_authority(upper_wkt: &str) -> Option<u32> {
    let wkt1 = upper_wkt
        .rfind("AUTHORITY[\"EPSG\",")
        .map(|i| i + "AUTHORITY[\"EPSG\",".len());
    let wkt2 = upper_wkt
        .rfind("ID[\"EPSG\",")
        .map(|i| i + "ID[\"EPSG\",".len());

    let start = match (wkt1, wkt2) {
        (Some(a), Some(b)) => a.max(b),
        (a, b) => a.or(b)?,
    };

    let digits: String = upper_wkt[start..]
        .chars()
        .skip_while(|c| *c == '"' || c.is_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg() {
        assert_eq!(
            SpatialRef::parse("EPSG:4326", SrsType::Epsg).unwrap(),
            SpatialRef::Geographic
        );
        assert_eq!(
            SpatialRef::parse("3857", SrsType::Epsg).unwrap(),
            SpatialRef::WebMercator
        );
        assert_eq!(
            SpatialRef::parse("EPSG:32610", SrsType::Epsg),
            Err(ProjectionError::UnsupportedEpsg(32610))
        );
    }

    #[test]
    fn test_parse_wkt_uses_outer_authority() {
        // Inner GEOGCS is 4326, outer PROJCS is 3857
        assert_eq!(
            SpatialRef::from_wkt(WEB_MERCATOR_WKT).unwrap(),
            SpatialRef::WebMercator
        );
        assert_eq!(SpatialRef::from_wkt(WGS84_WKT).unwrap(), SpatialRef::Geographic);
    }

    #[test]
    fn test_parse_wkt_without_authority() {
        let wkt = r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]]],PROJECTION["Mercator_1SP"]]"#;
        assert_eq!(SpatialRef::from_wkt(wkt).unwrap(), SpatialRef::WebMercator);

        let geo = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]]]"#;
        assert_eq!(SpatialRef::from_wkt(geo).unwrap(), SpatialRef::Geographic);
    }

    #[test]
    fn test_parse_proj4() {
        assert_eq!(
            SpatialRef::from_proj4("+proj=longlat +datum=WGS84 +no_defs").unwrap(),
            SpatialRef::Geographic
        );
        assert_eq!(
            SpatialRef::from_proj4("+proj=merc +a=6378137 +b=6378137 +lat_ts=0.0 +lon_0=0.0 +units=m")
                .unwrap(),
            SpatialRef::WebMercator
        );
        assert!(SpatialRef::from_proj4("+proj=utm +zone=10").is_err());
    }

    #[test]
    fn test_user_input_guessing() {
        assert_eq!(
            SpatialRef::from_user_input("epsg:3857").unwrap(),
            SpatialRef::WebMercator
        );
        assert_eq!(
            SpatialRef::from_user_input("urn:ogc:def:crs:EPSG::4326").unwrap(),
            SpatialRef::Geographic
        );
        assert_eq!(SpatialRef::from_user_input("4326").unwrap(), SpatialRef::Geographic);
        assert_eq!(SpatialRef::from_user_input("CRS:84").unwrap(), SpatialRef::Geographic);
        assert!(SpatialRef::from_user_input("not a projection").is_err());
    }

    #[test]
    fn test_srs_type_tags() {
        assert_eq!(SrsType::from_str("WKT").unwrap(), SrsType::Wkt);
        assert_eq!(SrsType::from_str("esri").unwrap(), SrsType::Wkt);
        assert_eq!(SrsType::from_str("").unwrap(), SrsType::Unknown);
        assert!(SrsType::from_str("mapinfo").is_err());
    }
}
