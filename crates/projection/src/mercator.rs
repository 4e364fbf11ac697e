//! Spherical (Web) Mercator projection.
//!
//! EPSG:3857 projects WGS84 longitude/latitude onto a sphere of radius
//! 6378137 m. Latitudes beyond ±85.0511° would map outside the square world
//! extent and are clamped first.

use std::f64::consts::PI;

/// Sphere radius used by Web Mercator, in meters.
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude at which the projected world becomes square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Project longitude/latitude degrees to Web Mercator meters.
pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Unproject Web Mercator meters to longitude/latitude degrees.
pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}
