use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::gps::GpsPoint;

/// Why a track was refused by the anti-cheat gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunRejection {
    /// Fewer than two points after sorting
    InsufficientData,
    /// Zero total elapsed time, or a position change between two samples
    /// with the same timestamp
    InvalidTimestamps,
    TooShort,
    /// Average speed above the running ceiling
    SuspiciousSpeed,
    /// Spike-filtered maximum speed above the ceiling
    ExcessiveMaxSpeed,
}

impl RunRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            RunRejection::InsufficientData => "insufficient GPS data",
            RunRejection::InvalidTimestamps => "invalid timestamps",
            RunRejection::TooShort => "too short",
            RunRejection::SuspiciousSpeed => "suspicious speed",
            RunRejection::ExcessiveMaxSpeed => "excessive max speed",
        }
    }
}

impl fmt::Display for RunRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Aggregated, anti-cheat checked summary of one uploaded track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRun {
    /// File-reported distance when present and positive, else `geometric_km`
    pub total_km: f64,
    /// Haversine sum over consecutive points (spike segments included)
    pub geometric_km: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: f64,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub elevation_gain_m: f64,
    pub start_point: Option<GpsPoint>,
    pub end_point: Option<GpsPoint>,
    pub point_count: usize,
    /// Segments excluded from max-speed tracking by the spike filter
    pub spike_segments: usize,
    /// Hex SHA-256 of the sorted point sequence
    pub fingerprint: String,
    pub is_valid: bool,
    pub rejection: Option<RunRejection>,
}

impl ValidatedRun {
    pub fn failure_reason(&self) -> Option<&'static str> {
        self.rejection.map(|r| r.reason())
    }

    /// First and last samples; always present on a valid run
    pub fn endpoints(&self) -> Option<(&GpsPoint, &GpsPoint)> {
        match (&self.start_point, &self.end_point) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}
