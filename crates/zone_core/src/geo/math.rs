//! Great-circle distance, bearing and hex pixel projection

use crate::models::GeoPoint;

/// Mean Earth radius used by every distance calculation
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Haversine distance between two lat/lng pairs in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push `a` marginally above 1 for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Initial compass bearing from `from` to `to`, normalized to `[0, 360)`.
pub fn bearing_deg(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlng = (to.lng - from.lng).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Pointy-top axial projection: `x = size·√3·(q + r/2)`, `y = size·1.5·r`.
///
/// Only used for distance heuristics, never for rendering.
pub fn axial_to_pixel(q: i32, r: i32, size: f64) -> (f64, f64) {
    let q = q as f64;
    let r = r as f64;
    (size * SQRT_3 * (q + r / 2.0), size * 1.5 * r)
}
