//! Entry points for a surrounding application, using the default config

use crate::config::DEFAULT_CONFIG;
use crate::error::Result;
use crate::grid::HexGridIndex;
use crate::models::{GeoPoint, GpsPoint, ValidatedRun, Zone};
use crate::placement::{PlacementResult, ZonePlacementResolver};
use crate::reward::{RewardAllocation, RewardAllocator};
use crate::validation::RunValidator;
use crate::workflow::{BatchSummary, FinalizedRun, RunWorkflowOrchestrator, ZoneDecision, ZonePrompt};

pub fn validate_run(points: &[GpsPoint], reported_km: Option<f64>) -> ValidatedRun {
    RunValidator::new(DEFAULT_CONFIG.anti_cheat.clone()).validate(points, reported_km)
}

pub fn find_nearest_zone(lat: f64, lng: f64, radius_km: f64, grid: &HexGridIndex) -> Option<&Zone> {
    grid.nearest(lat, lng, radius_km)
}

/// Free a cell for a zone at `(lat, lng)`; displaced zones are already moved
/// in `grid` and listed in the result for the caller to persist.
pub fn resolve_placement(
    lat: f64,
    lng: f64,
    group_key: &str,
    grid: &mut HexGridIndex,
) -> Result<PlacementResult> {
    ZonePlacementResolver::new(DEFAULT_CONFIG.discovery.clone()).resolve(
        GeoPoint::new(lat, lng),
        group_key,
        grid,
    )
}

pub fn allocate_reward(run: &ValidatedRun, grid: &HexGridIndex) -> Result<RewardAllocation> {
    RewardAllocator::new(DEFAULT_CONFIG.economy.clone(), DEFAULT_CONFIG.discovery.clone())
        .allocate_now(run, grid, None)
}

/// Process a batch against `grid`, which holds the committed result after
/// the call (also when the batch aborts part-way).
pub fn run_batch<C, P>(
    runs: Vec<ValidatedRun>,
    grid: &mut HexGridIndex,
    confirm: C,
    persist: P,
) -> Result<BatchSummary>
where
    C: FnMut(&ZonePrompt) -> ZoneDecision,
    P: FnMut(&FinalizedRun) -> anyhow::Result<()>,
{
    let mut orchestrator = RunWorkflowOrchestrator::new(std::mem::take(grid), DEFAULT_CONFIG.clone());
    let result = orchestrator.run_batch(runs, confirm, persist);
    *grid = orchestrator.into_grid();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::AxialCoord;
    use chrono::{Duration, TimeZone, Utc};

    fn track() -> Vec<GpsPoint> {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 10, 6, 30, 0).unwrap();
        (0..=30)
            .map(|i| GpsPoint::new(45.0 + i as f64 * 0.0009, 9.0, 100.0, t0 + Duration::seconds(i * 40)))
            .collect()
    }

    #[test]
    fn test_end_to_end_with_defaults() {
        let run = validate_run(&track(), None);
        assert!(run.is_valid, "{:?}", run.rejection);

        let mut grid = HexGridIndex::new();
        let placement = resolve_placement(45.0, 9.0, "IT", &mut grid).unwrap();
        assert_eq!(placement.coord, AxialCoord::ORIGIN);

        let summary = run_batch(
            vec![run.clone()],
            &mut grid,
            |_| ZoneDecision::Create { name: "Darsena".to_string(), group_key: Some("IT".to_string()) },
            |_| Ok(()),
        )
        .unwrap();
        assert_eq!(summary.zones_created, 2);
        assert_eq!(grid.len(), 2);

        assert!(find_nearest_zone(45.0, 9.0, 0.5, &grid).is_some());
        let allocation = allocate_reward(&run, &grid).unwrap();
        assert_eq!(allocation.zone_km_buckets.len(), 2);
    }
}
