//! Geographic and hex-grid math
//!
//! Pure functions only. Distances are great-circle kilometres, bearings are
//! compass degrees (0 = north, 90 = east), hex cells use axial `(q, r)`
//! coordinates with a pointy-top projection.

pub mod hex;
pub mod math;

pub use hex::{bearing_to_hex_direction, hex_distance, AxialCoord, HexDirection};
pub use math::{axial_to_pixel, bearing_deg, haversine_km, EARTH_RADIUS_KM};
