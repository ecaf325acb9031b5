//! File helpers for the zone CLI
//!
//! Zone files are either a JSON array of zones (`.json`) or a compressed
//! grid snapshot (any other extension).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use zone_core::api::TrackInput;
use zone_core::{
    BatchSummary, GameConfig, HexGridIndex, MemoryZoneStore, RunWorkflowOrchestrator,
    ValidatedRun, Zone, ZoneDecision, ZoneStore,
};

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse JSON: {}", path.display()))
}

/// Load a grid from a zone file. A missing file yields an empty grid.
pub fn load_grid(path: &Path) -> Result<HexGridIndex> {
    if !path.exists() {
        return Ok(HexGridIndex::new());
    }
    if is_json(path) {
        let zones: Vec<Zone> = read_json(path)?;
        return HexGridIndex::from_zones(zones)
            .with_context(|| format!("Zone file has colliding cells: {}", path.display()));
    }
    zone_core::load_snapshot(path)
        .with_context(|| format!("Failed to load snapshot: {}", path.display()))
}

/// Write a grid in the format implied by the extension
pub fn write_grid(path: &Path, grid: &HexGridIndex) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    if is_json(path) {
        let json = serde_json::to_string_pretty(&grid.to_vec())?;
        fs::write(path, json).with_context(|| format!("Failed to write file: {}", path.display()))?;
        return Ok(());
    }
    zone_core::save_snapshot(path, grid)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))
}

/// A track file holds `{ "points": [...], "reported_km": ... }`
pub fn load_track(path: &Path) -> Result<TrackInput> {
    read_json(path)
}

pub fn load_decisions(path: &Path) -> Result<Vec<ZoneDecision>> {
    read_json(path)
}

/// Process a batch and write the resulting grid to `out`.
///
/// Decisions answer zone prompts in order; prompts beyond the list are
/// skipped. The grid is written even when the batch stops part-way, so
/// runs committed before the failure are kept.
pub fn run_batch_to_file(
    grid: HexGridIndex,
    config: GameConfig,
    runs: Vec<ValidatedRun>,
    decisions: Vec<ZoneDecision>,
    runner: Option<String>,
    out: &Path,
) -> Result<BatchSummary> {
    let mut store = MemoryZoneStore::with_zones(grid.to_vec());
    let mut orchestrator = RunWorkflowOrchestrator::new(grid, config);
    if let Some(runner) = runner {
        orchestrator = orchestrator.with_runner(runner);
    }

    let mut decisions = decisions.into_iter();
    let result = orchestrator.run_batch(
        runs,
        |prompt| {
            let decision = decisions.next().unwrap_or(ZoneDecision::Skip);
            println!(
                "   Run {} {:?} zone at ({:.5}, {:.5}): {:?}",
                prompt.run_index, prompt.role, prompt.location.lat, prompt.location.lng, decision
            );
            decision
        },
        |run| {
            store.commit_run(run)?;
            println!(
                "   Run {}: {:.2} km, reward {:.2}",
                run.run_index, run.run.total_km, run.allocation.runner_reward
            );
            Ok(())
        },
    );
    println!("   Stored {} run record(s)", store.runs().len());

    write_grid(out, &orchestrator.into_grid())?;
    println!("Zone file written: {}", out.display());

    result.context("Batch stopped early")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;
    use zone_core::{AxialCoord, DiscoveryConfig, GeoPoint, GpsPoint, RunValidator, ZoneId};

    fn sample_grid() -> HexGridIndex {
        let zones = vec![
            Zone::new(ZoneId::new("z1"), "Navigli", "IT", AxialCoord::ORIGIN, GeoPoint::new(45.0, 9.0)),
            Zone::new(ZoneId::new("z2"), "Isola", "IT", AxialCoord::new(1, 0), GeoPoint::new(45.01, 9.05)),
        ];
        HexGridIndex::from_zones(zones).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_grid() {
        let dir = tempdir().unwrap();
        let grid = load_grid(&dir.path().join("absent.json")).unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn test_json_and_snapshot_files() {
        let dir = tempdir().unwrap();
        let grid = sample_grid();

        for name in ["zones.json", "zones.snap"] {
            let path = dir.path().join(name);
            write_grid(&path, &grid).unwrap();
            let loaded = load_grid(&path).unwrap();
            assert_eq!(loaded.to_vec(), grid.to_vec(), "{}", name);
        }
    }

    #[test]
    fn test_colliding_json_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let mut zones = sample_grid().to_vec();
        zones[1].coord = AxialCoord::ORIGIN;
        fs::write(&path, serde_json::to_string(&zones).unwrap()).unwrap();

        assert!(load_grid(&path).is_err());
    }

    #[test]
    fn test_load_decisions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("decisions.json");
        fs::write(&path, r#"[{"type":"Create","name":"Brera"},{"type":"Skip"}]"#).unwrap();

        let decisions = load_decisions(&path).unwrap();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[1], ZoneDecision::Skip);
    }

    /// Out-and-back loop of 0.2 km starting at `(lat, lng)`
    fn loop_run(lat: f64, lng: f64) -> ValidatedRun {
        let t0 = Utc.with_ymd_and_hms(2024, 4, 6, 8, 0, 0).unwrap();
        let points = vec![
            GpsPoint::new(lat, lng, 50.0, t0),
            GpsPoint::new(lat + 0.0009, lng, 50.0, t0 + Duration::minutes(1)),
            GpsPoint::new(lat, lng, 50.0, t0 + Duration::minutes(2)),
        ];
        RunValidator::default().validate(&points, None)
    }

    #[test]
    fn test_batch_writes_committed_runs_when_stopped_early() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("after.json");

        let mut grid = sample_grid();
        let gorla =
            Zone::new(ZoneId::new("z3"), "Gorla", "IT", AxialCoord::new(2, 0), GeoPoint::new(46.0, 10.0));
        grid.upsert(gorla).unwrap();
        let config = GameConfig {
            discovery: DiscoveryConfig { max_chain_depth: 1, ..Default::default() },
            ..GameConfig::default()
        };
        let decisions = vec![
            ZoneDecision::Create { name: "West".to_string(), group_key: None },
            ZoneDecision::Create { name: "East".to_string(), group_key: None },
        ];

        // The second zone would push two zones in a row, over the chain cap
        let result = run_batch_to_file(
            grid,
            config,
            vec![loop_run(45.0, 8.0), loop_run(45.002, 9.01)],
            decisions,
            None,
            &out,
        );
        assert!(result.is_err());

        let written = load_grid(&out).unwrap();
        assert_eq!(written.len(), 4);
        let west = written.zones().find(|z| z.name == "West").unwrap();
        assert!(west.total_km > 0.0);
        assert!(written.zones().all(|z| z.name != "East"));
    }

    #[test]
    fn test_batch_without_decisions_skips_prompts() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("zones.snap");

        let summary = run_batch_to_file(
            sample_grid(),
            GameConfig::default(),
            vec![loop_run(45.0, 8.0)],
            Vec::new(),
            Some("runner-1".to_string()),
            &out,
        )
        .unwrap();

        assert_eq!(summary.runs_finalized, 1);
        assert_eq!(summary.zones_created, 0);
        assert_eq!(load_grid(&out).unwrap().len(), 2);
    }
}
