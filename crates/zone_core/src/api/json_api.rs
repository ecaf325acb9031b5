// JSON entry points for hosts that talk to the core through strings
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::error::{CoreError, Result};
use crate::grid::HexGridIndex;
use crate::models::{GeoPoint, GpsPoint, ValidatedRun, Zone};
use crate::placement::{PlacementResult, ZonePlacementResolver};
use crate::reward::{RewardAllocation, RewardAllocator};
use crate::validation::RunValidator;
use crate::workflow::{BatchSummary, FinalizedRun, RunWorkflowOrchestrator, ZoneDecision, ZonePrompt};
use crate::SCHEMA_VERSION;

/// One uploaded track as decoded by the file parsers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInput {
    pub points: Vec<GpsPoint>,
    #[serde(default)]
    pub reported_km: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRunRequest {
    pub schema_version: u8,
    #[serde(flatten)]
    pub track: TrackInput,
    #[serde(default)]
    pub config: Option<GameConfig>,
}

#[derive(Debug, Serialize)]
pub struct ValidateRunResponse {
    pub schema_version: u8,
    pub run: ValidatedRun,
}

#[derive(Debug, Deserialize)]
pub struct PlacementRequest {
    pub schema_version: u8,
    pub zones: Vec<Zone>,
    pub lat: f64,
    pub lng: f64,
    pub group_key: String,
    #[serde(default)]
    pub config: Option<GameConfig>,
}

#[derive(Debug, Serialize)]
pub struct PlacementResponse {
    pub schema_version: u8,
    pub placement: PlacementResult,
}

#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub schema_version: u8,
    pub zones: Vec<Zone>,
    pub run: ValidatedRun,
    #[serde(default)]
    pub runner_id: Option<String>,
    /// Evaluation time for boost expiry; the current time when omitted
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
    #[serde(default)]
    pub config: Option<GameConfig>,
}

#[derive(Debug, Serialize)]
pub struct AllocateResponse {
    pub schema_version: u8,
    pub allocation: RewardAllocation,
}

/// A batch with every zone decision supplied up front. Decisions are
/// consumed in prompt order; prompts beyond the list are skipped.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub schema_version: u8,
    pub zones: Vec<Zone>,
    pub tracks: Vec<TrackInput>,
    #[serde(default)]
    pub decisions: Vec<ZoneDecision>,
    #[serde(default)]
    pub runner_id: Option<String>,
    #[serde(default)]
    pub config: Option<GameConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub schema_version: u8,
    pub summary: BatchSummary,
    pub runs: Vec<ValidatedRun>,
    pub prompts: Vec<ZonePrompt>,
    pub finalized: Vec<FinalizedRun>,
    /// Full grid after the batch
    pub zones: Vec<Zone>,
}

fn check_schema(version: u8) -> Result<()> {
    if version != SCHEMA_VERSION {
        warn!(version, expected = SCHEMA_VERSION, "schema version mismatch");
        return Err(CoreError::InvalidParameter(format!(
            "unsupported schema_version {} (expected {})",
            version, SCHEMA_VERSION
        )));
    }
    Ok(())
}

fn resolve_config(config: Option<GameConfig>) -> Result<GameConfig> {
    let config = config.unwrap_or_default();
    config.validate()?;
    Ok(config)
}

pub fn validate_run_json(request_json: &str) -> Result<String> {
    let request: ValidateRunRequest = serde_json::from_str(request_json)?;
    check_schema(request.schema_version)?;
    let config = resolve_config(request.config)?;

    let run = RunValidator::new(config.anti_cheat)
        .validate(&request.track.points, request.track.reported_km);
    info!(valid = run.is_valid, km = run.total_km, "validated run");

    Ok(serde_json::to_string(&ValidateRunResponse { schema_version: SCHEMA_VERSION, run })?)
}

pub fn resolve_placement_json(request_json: &str) -> Result<String> {
    let request: PlacementRequest = serde_json::from_str(request_json)?;
    check_schema(request.schema_version)?;
    let config = resolve_config(request.config)?;

    let mut grid = HexGridIndex::from_zones(request.zones)?;
    let placement = ZonePlacementResolver::new(config.discovery).resolve(
        GeoPoint::new(request.lat, request.lng),
        &request.group_key,
        &mut grid,
    )?;
    info!(
        q = placement.coord.q,
        r = placement.coord.r,
        displaced = placement.displaced.len(),
        "resolved placement"
    );

    Ok(serde_json::to_string(&PlacementResponse { schema_version: SCHEMA_VERSION, placement })?)
}

pub fn allocate_reward_json(request_json: &str) -> Result<String> {
    let request: AllocateRequest = serde_json::from_str(request_json)?;
    check_schema(request.schema_version)?;
    let config = resolve_config(request.config)?;

    let grid = HexGridIndex::from_zones(request.zones)?;
    let allocation = RewardAllocator::new(config.economy, config.discovery).allocate(
        &request.run,
        &grid,
        request.runner_id.as_deref(),
        request.now.unwrap_or_else(Utc::now),
    )?;

    Ok(serde_json::to_string(&AllocateResponse { schema_version: SCHEMA_VERSION, allocation })?)
}

/// Validate every track, then run the batch. Persistence always succeeds;
/// the response carries each finalized run for the host to store.
pub fn run_batch_request(request: BatchRequest) -> Result<BatchResponse> {
    check_schema(request.schema_version)?;
    let config = resolve_config(request.config)?;

    let validator = RunValidator::new(config.anti_cheat.clone());
    let runs: Vec<ValidatedRun> = request
        .tracks
        .iter()
        .map(|track| validator.validate(&track.points, track.reported_km))
        .collect();

    let grid = HexGridIndex::from_zones(request.zones)?;
    let mut orchestrator = RunWorkflowOrchestrator::new(grid, config);
    if let Some(runner_id) = request.runner_id {
        orchestrator = orchestrator.with_runner(runner_id);
    }

    let mut decisions: VecDeque<ZoneDecision> = request.decisions.into();
    let mut prompts = Vec::new();
    let mut finalized = Vec::new();
    let summary = orchestrator.run_batch(
        runs.clone(),
        |prompt| {
            prompts.push(prompt.clone());
            decisions.pop_front().unwrap_or(ZoneDecision::Skip)
        },
        |run| {
            finalized.push(run.clone());
            Ok(())
        },
    )?;
    info!(
        runs = summary.runs_finalized,
        km = summary.total_km,
        reward = summary.total_reward,
        "batch complete"
    );

    Ok(BatchResponse {
        schema_version: SCHEMA_VERSION,
        summary,
        runs,
        prompts,
        finalized,
        zones: orchestrator.into_grid().to_vec(),
    })
}

pub fn run_batch_json(request_json: &str) -> Result<String> {
    let request: BatchRequest = serde_json::from_str(request_json)?;
    Ok(serde_json::to_string(&run_batch_request(request)?)?)
}
