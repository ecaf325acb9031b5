use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bare latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        crate::geo::haversine_km(self.lat, self.lng, other.lat, other.lng)
    }
}

/// One timestamped track sample as produced by the track-file parsers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub lat: f64,
    pub lng: f64,
    /// Metres above sea level
    #[serde(default)]
    pub elevation: f64,
    pub time: DateTime<Utc>,
}

impl GpsPoint {
    pub fn new(lat: f64, lng: f64, elevation: f64, time: DateTime<Utc>) -> Self {
        Self { lat, lng, elevation, time }
    }

    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}
