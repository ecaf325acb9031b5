//! Post-hoc anti-cheat validation of uploaded tracks
//!
//! Turns an ordered list of GPS samples into distance, speed and elevation
//! aggregates and decides whether the run is physically plausible. Pure and
//! deterministic: the same points always yield the same `ValidatedRun`.
//!
//! Known gap, kept for compatibility with existing records: a segment that
//! trips the spike filter is dropped from max-speed tracking but its
//! distance is still counted, so one teleport-like jump with a long reported
//! gap can inflate total distance without failing the speed checks.

use sha2::{Digest, Sha256};

use crate::config::AntiCheatConfig;
use crate::models::{GpsPoint, RunRejection, ValidatedRun};

/// Absorbs float noise at the exact threshold values
const THRESHOLD_EPSILON: f64 = 1e-9;

const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, Default)]
pub struct RunValidator {
    config: AntiCheatConfig,
}

/// Segment walk results before the final distance is chosen
#[derive(Debug, Default)]
struct TrackAggregates {
    geometric_km: f64,
    max_speed_kmh: f64,
    elevation_gain_m: f64,
    spike_segments: usize,
    /// Segments that move without any elapsed time
    instant_jumps: usize,
}

impl RunValidator {
    pub fn new(config: AntiCheatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AntiCheatConfig {
        &self.config
    }

    /// Validate a track. `reported_km` is the distance stored in the track
    /// file, if any; when positive it wins over the integrated distance.
    pub fn validate(&self, points: &[GpsPoint], reported_km: Option<f64>) -> ValidatedRun {
        let mut sorted = points.to_vec();
        // Stable, so equal timestamps keep upload order
        sorted.sort_by_key(|p| p.time);

        let aggregates = self.aggregate(&sorted);
        let total_km = match reported_km {
            Some(km) if km.is_finite() && km > 0.0 => km,
            _ => aggregates.geometric_km,
        };

        let (start_time, duration_ms) = match (sorted.first(), sorted.last()) {
            (Some(first), Some(last)) => {
                (Some(first.time), (last.time - first.time).num_milliseconds())
            }
            _ => (None, 0),
        };
        let avg_speed_kmh =
            if duration_ms > 0 { total_km / (duration_ms as f64 / MS_PER_HOUR) } else { 0.0 };

        let rejection = self.gate(
            sorted.len(),
            duration_ms,
            total_km,
            avg_speed_kmh,
            aggregates.max_speed_kmh,
            aggregates.instant_jumps,
        );
        if let Some(rejection) = rejection {
            log::debug!(
                "Run rejected ({}): {:.3} km, avg {:.2} km/h, max {:.2} km/h, {} points",
                rejection,
                total_km,
                avg_speed_kmh,
                aggregates.max_speed_kmh,
                sorted.len()
            );
        }

        ValidatedRun {
            total_km,
            geometric_km: aggregates.geometric_km,
            start_time,
            duration_minutes: duration_ms as f64 / MS_PER_MINUTE,
            avg_speed_kmh,
            max_speed_kmh: aggregates.max_speed_kmh,
            elevation_gain_m: aggregates.elevation_gain_m,
            start_point: sorted.first().cloned(),
            end_point: sorted.last().cloned(),
            point_count: sorted.len(),
            spike_segments: aggregates.spike_segments,
            fingerprint: fingerprint(&sorted),
            is_valid: rejection.is_none(),
            rejection,
        }
    }

    fn aggregate(&self, sorted: &[GpsPoint]) -> TrackAggregates {
        let mut totals = TrackAggregates::default();

        for pair in sorted.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let segment_km = crate::geo::haversine_km(a.lat, a.lng, b.lat, b.lng);
            totals.geometric_km += segment_km;

            let elapsed_ms = (b.time - a.time).num_milliseconds();
            if elapsed_ms > 0 {
                let speed_kmh = segment_km / (elapsed_ms as f64 / MS_PER_HOUR);
                if speed_kmh > self.config.spike_speed_kmh
                    && segment_km > self.config.spike_min_segment_km
                {
                    totals.spike_segments += 1;
                } else if speed_kmh > totals.max_speed_kmh {
                    totals.max_speed_kmh = speed_kmh;
                }
            } else if segment_km > 0.0 {
                totals.instant_jumps += 1;
            }

            let climb_m = b.elevation - a.elevation;
            if climb_m > 0.0 && climb_m < self.config.max_elevation_step_m {
                totals.elevation_gain_m += climb_m;
            }
        }

        totals
    }

    /// First failing condition wins
    fn gate(
        &self,
        point_count: usize,
        duration_ms: i64,
        total_km: f64,
        avg_speed_kmh: f64,
        max_speed_kmh: f64,
        instant_jumps: usize,
    ) -> Option<RunRejection> {
        if point_count < 2 {
            return Some(RunRejection::InsufficientData);
        }
        // A position change with no elapsed time has no finite speed
        if duration_ms <= 0 || instant_jumps > 0 {
            return Some(RunRejection::InvalidTimestamps);
        }
        if total_km < self.config.min_distance_km - THRESHOLD_EPSILON {
            return Some(RunRejection::TooShort);
        }
        if avg_speed_kmh > self.config.max_avg_speed_kmh + THRESHOLD_EPSILON {
            return Some(RunRejection::SuspiciousSpeed);
        }
        if max_speed_kmh > self.config.max_speed_kmh + THRESHOLD_EPSILON {
            return Some(RunRejection::ExcessiveMaxSpeed);
        }
        None
    }
}

/// Hex SHA-256 over the sample sequence, used to spot duplicate uploads
pub fn fingerprint(points: &[GpsPoint]) -> String {
    let mut hasher = Sha256::new();
    for point in points {
        hasher.update(point.lat.to_le_bytes());
        hasher.update(point.lng.to_le_bytes());
        hasher.update(point.elevation.to_le_bytes());
        hasher.update(point.time.timestamp_millis().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    /// Degrees of latitude per kilometre on the 6371 km sphere
    const DEG_PER_KM: f64 = 1.0 / 111.194_926_644_558_73;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap()
    }

    /// Straight northward track: `segments` steps of `step_km`, `step_ms` apart
    fn track(segments: usize, step_km: f64, step_ms: i64) -> Vec<GpsPoint> {
        (0..=segments)
            .map(|i| {
                GpsPoint::new(
                    45.0 + i as f64 * step_km * DEG_PER_KM,
                    9.0,
                    120.0,
                    t0() + Duration::milliseconds(i as i64 * step_ms),
                )
            })
            .collect()
    }

    fn validator() -> RunValidator {
        RunValidator::default()
    }

    #[test]
    fn test_single_point_is_insufficient() {
        let run = validator().validate(&track(0, 0.1, 1000), None);
        assert!(!run.is_valid);
        assert_eq!(run.failure_reason(), Some("insufficient GPS data"));
        assert_eq!(run.point_count, 1);
    }

    #[test]
    fn test_empty_track_is_insufficient() {
        let run = validator().validate(&[], Some(5.0));
        assert_eq!(run.rejection, Some(RunRejection::InsufficientData));
        assert!(run.endpoints().is_none());
    }

    #[test]
    fn test_identical_timestamps_rejected() {
        let run = validator().validate(&track(5, 0.1, 0), None);
        assert_eq!(run.rejection, Some(RunRejection::InvalidTimestamps));
        assert_eq!(run.avg_speed_kmh, 0.0);
        assert_eq!(run.max_speed_kmh, 0.0);
    }

    #[test]
    fn test_repeated_timestamp_jump_rejected() {
        // 3 km at 6 km/h, then a 5 km jump stamped with the previous time
        let mut points = track(30, 0.1, 60_000);
        let last = points.last().unwrap().clone();
        points.push(GpsPoint::new(last.lat + 5.0 * DEG_PER_KM, last.lng, last.elevation, last.time));

        let run = validator().validate(&points, None);
        assert!(!run.is_valid);
        assert_eq!(run.failure_reason(), Some("invalid timestamps"));
        assert!((run.geometric_km - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_timestamp_without_movement_is_accepted() {
        let mut points = track(30, 0.1, 60_000);
        let duplicate = points[10].clone();
        points.insert(11, duplicate);

        let run = validator().validate(&points, None);
        assert!(run.is_valid, "rejected: {:?}", run.rejection);
        assert_eq!(run.point_count, 32);
    }

    #[test]
    fn test_boundary_exactly_minimum_distance_and_speed_is_valid() {
        // 0.1 km in 14.4 s is exactly 25 km/h
        let run = validator().validate(&track(1, 0.1, 14_400), Some(0.1));
        assert!(run.is_valid, "rejected: {:?}", run.rejection);
        assert!((run.avg_speed_kmh - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_just_under_minimum_distance_is_too_short() {
        let run = validator().validate(&track(1, 0.099, 60_000), Some(0.099));
        assert!(!run.is_valid);
        assert_eq!(run.failure_reason(), Some("too short"));
    }

    #[test]
    fn test_just_over_average_speed_is_suspicious() {
        // 0.1 km in 14.394 s ≈ 25.01 km/h
        let run = validator().validate(&track(1, 0.1, 14_394), Some(0.1));
        assert!(!run.is_valid);
        assert_eq!(run.failure_reason(), Some("suspicious speed"));
    }

    #[test]
    fn test_reported_distance_wins() {
        // 48 × 0.1 km, 37.5 s apart: 4.8 km over 30 minutes
        let run = validator().validate(&track(48, 0.1, 37_500), Some(5.0));
        assert!(run.is_valid);
        assert_eq!(run.total_km, 5.0);
        assert!((run.geometric_km - 4.8).abs() < 1e-6);
        assert!((run.duration_minutes - 30.0).abs() < 1e-9);
        assert!((run.avg_speed_kmh - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_reported_distance_falls_back_to_geometry() {
        let points = track(48, 0.1, 37_500);
        for reported in [None, Some(0.0), Some(-3.0), Some(f64::NAN)] {
            let run = validator().validate(&points, reported);
            assert!((run.total_km - 4.8).abs() < 1e-6);
        }
    }

    #[test]
    fn test_spike_segment_ignored_for_max_speed_but_counted_for_distance() {
        let mut points = track(20, 0.1, 60_000);
        // Teleport 1 km north in 10 s (360 km/h)
        let last = points.last().unwrap().clone();
        points.push(GpsPoint::new(
            last.lat + 1.0 * DEG_PER_KM,
            last.lng,
            last.elevation,
            last.time + Duration::seconds(10),
        ));

        let run = validator().validate(&points, None);
        assert_eq!(run.spike_segments, 1);
        assert!((run.geometric_km - 3.0).abs() < 1e-6);
        assert!((run.max_speed_kmh - 6.0).abs() < 1e-6);
        assert!(run.is_valid);
    }

    #[test]
    fn test_short_fast_segment_is_not_a_spike() {
        // 0.04 km in 0.5 s is 288 km/h but under the 0.05 km spike floor
        let mut points = track(30, 0.1, 60_000);
        let last = points.last().unwrap().clone();
        points.push(GpsPoint::new(
            last.lat + 0.04 * DEG_PER_KM,
            last.lng,
            last.elevation,
            last.time + Duration::milliseconds(500),
        ));

        let run = validator().validate(&points, None);
        assert_eq!(run.spike_segments, 0);
        assert_eq!(run.rejection, Some(RunRejection::ExcessiveMaxSpeed));
    }

    #[test]
    fn test_max_speed_over_limit_rejected() {
        // Slow overall, one 72 km/h burst
        let mut points = track(30, 0.1, 60_000);
        let last = points.last().unwrap().clone();
        points.push(GpsPoint::new(
            last.lat + 0.2 * DEG_PER_KM,
            last.lng,
            last.elevation,
            last.time + Duration::seconds(10),
        ));

        let run = validator().validate(&points, None);
        assert!((run.max_speed_kmh - 72.0).abs() < 1e-6);
        assert_eq!(run.failure_reason(), Some("excessive max speed"));
    }

    #[test]
    fn test_elevation_gain_filters_spikes_and_descents() {
        let mut points = track(4, 0.1, 60_000);
        let elevations = [100.0, 110.0, 170.0, 165.0, 185.0];
        for (point, elevation) in points.iter_mut().zip(elevations) {
            point.elevation = elevation;
        }

        let run = validator().validate(&points, None);
        // +10 counted, +60 spike ignored, -5 ignored, +20 counted
        assert!((run.elevation_gain_m - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let points = track(10, 0.1, 60_000);
        let mut shuffled = points.clone();
        shuffled.reverse();
        shuffled.swap(2, 7);

        let a = validator().validate(&points, None);
        let b = validator().validate(&shuffled, None);
        assert_eq!(a, b);
        assert_eq!(b.start_point.unwrap().time, t0());
    }

    #[test]
    fn test_fingerprint_changes_with_points() {
        let points = track(10, 0.1, 60_000);
        let mut other = points.clone();
        other[3].elevation += 1.0;

        assert_eq!(fingerprint(&points), fingerprint(&points.clone()));
        assert_ne!(fingerprint(&points), fingerprint(&other));
        assert_eq!(fingerprint(&points).len(), 64);
    }
}
