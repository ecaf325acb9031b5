//! Run workflow state machine
//!
//! `Idle → Analyzing → AwaitingZoneDecision → Finalizing → … → BatchComplete`
//!
//! Each queued run is analyzed against the grid (persisted zones plus zones
//! minted earlier in this batch). Endpoints far from every zone become zone
//! prompts that an outside party confirms or skips one at a time. Once no
//! prompts remain the run's reward is allocated and handed to the persist
//! callback; only after that succeeds do reward updates reach the grid.
//!
//! A failed persist rolls the current run's new zones and displacements back
//! out of the grid and aborts the rest of the queue. Runs finalized earlier
//! in the batch stay finalized: each run commits on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use super::store::ZoneStore;
use crate::config::GameConfig;
use crate::error::{CoreError, Result};
use crate::geo::AxialCoord;
use crate::grid::HexGridIndex;
use crate::models::{GeoPoint, ValidatedRun, Zone, ZoneId};
use crate::placement::ZonePlacementResolver;
use crate::reward::{round_currency, RewardAllocation, RewardAllocator};

/// Group key used when neither the decision nor the grid offers one
pub const UNKNOWN_GROUP: &str = "XX";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneRole {
    Start,
    End,
}

/// A location that needs a brand-new zone, awaiting confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePrompt {
    /// Position of the run within the submitted batch
    pub run_index: usize,
    pub role: ZoneRole,
    pub location: GeoPoint,
    /// Group key of the nearest existing zone, if any
    pub suggested_group: Option<String>,
    pub mint_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ZoneDecision {
    Create { name: String, group_key: Option<String> },
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowState {
    Idle,
    Analyzing { run_index: usize },
    AwaitingZoneDecision { run_index: usize, pending: usize },
    Finalizing { run_index: usize },
    BatchComplete,
    Aborted { run_index: usize, reason: String },
}

/// Everything the store must write for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedRun {
    pub run_index: usize,
    pub runner_id: Option<String>,
    pub run: ValidatedRun,
    pub allocation: RewardAllocation,
    /// Zones minted for this run
    pub created_zones: Vec<ZoneId>,
    /// Final state of every zone created, displaced or credited by this run
    pub zone_deltas: Vec<Zone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BatchSummary {
    pub runs_finalized: usize,
    pub runs_rejected: usize,
    pub duplicates_skipped: usize,
    pub total_km: f64,
    /// Runner payout over the batch, rounded to currency precision
    pub total_reward: f64,
    /// Distinct names of credited zones, first touch first
    pub zone_names: Vec<String>,
    pub zones_created: usize,
    pub mint_cost: f64,
    pub any_reinforced: bool,
}

/// Grid changes made for the current run, undone if its persist fails
#[derive(Debug, Clone)]
enum JournalEntry {
    Created(ZoneId),
    Moved { zone_id: ZoneId, from: AxialCoord },
}

pub struct RunWorkflowOrchestrator {
    grid: HexGridIndex,
    config: GameConfig,
    resolver: ZonePlacementResolver,
    allocator: RewardAllocator,
    runner_id: Option<String>,
    clock: fn() -> DateTime<Utc>,
    state: WorkflowState,
    queue: VecDeque<(usize, ValidatedRun)>,
    current: Option<(usize, ValidatedRun)>,
    prompts: VecDeque<ZonePrompt>,
    journal: Vec<JournalEntry>,
    finalized_fingerprints: HashSet<String>,
    reward_exact: f64,
    summary: BatchSummary,
}

impl RunWorkflowOrchestrator {
    pub fn new(grid: HexGridIndex, config: GameConfig) -> Self {
        Self {
            resolver: ZonePlacementResolver::new(config.discovery.clone()),
            allocator: RewardAllocator::new(config.economy.clone(), config.discovery.clone()),
            grid,
            config,
            runner_id: None,
            clock: Utc::now,
            state: WorkflowState::Idle,
            queue: VecDeque::new(),
            current: None,
            prompts: VecDeque::new(),
            journal: Vec::new(),
            finalized_fingerprints: HashSet::new(),
            reward_exact: 0.0,
            summary: BatchSummary::default(),
        }
    }

    /// Runner whose uploads this batch contains (enables reinforcement)
    pub fn with_runner(mut self, runner_id: impl Into<String>) -> Self {
        self.runner_id = Some(runner_id.into());
        self
    }

    /// Clock read at each allocation to decide boost expiry
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn grid(&self) -> &HexGridIndex {
        &self.grid
    }

    pub fn into_grid(self) -> HexGridIndex {
        self.grid
    }

    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }

    pub fn current_prompt(&self) -> Option<&ZonePrompt> {
        match self.state {
            WorkflowState::AwaitingZoneDecision { .. } => self.prompts.front(),
            _ => None,
        }
    }

    /// Queue a batch and analyze its first run
    pub fn start_batch(&mut self, runs: Vec<ValidatedRun>) -> Result<()> {
        match self.state {
            WorkflowState::Idle | WorkflowState::BatchComplete | WorkflowState::Aborted { .. } => {}
            ref other => {
                return Err(CoreError::InvalidState(format!(
                    "cannot start a batch while {:?}",
                    other
                )))
            }
        }

        log::info!("Starting batch of {} runs", runs.len());
        self.queue = runs.into_iter().enumerate().collect();
        self.current = None;
        self.prompts.clear();
        self.journal.clear();
        self.finalized_fingerprints.clear();
        self.reward_exact = 0.0;
        self.summary = BatchSummary::default();
        self.state = WorkflowState::Idle;
        self.advance();
        Ok(())
    }

    /// Apply the decision for the current prompt
    pub fn resolve_prompt(&mut self, decision: ZoneDecision) -> Result<Option<Zone>> {
        let WorkflowState::AwaitingZoneDecision { run_index, .. } = self.state else {
            return Err(CoreError::InvalidState(format!(
                "no zone decision pending in {:?}",
                self.state
            )));
        };
        let prompt = self
            .prompts
            .pop_front()
            .ok_or_else(|| CoreError::InvalidState("zone prompt queue empty".to_string()))?;

        let created = match decision {
            ZoneDecision::Create { name, group_key } => {
                match self.mint_zone(&prompt, name, group_key) {
                    Ok(zone) => Some(zone),
                    Err(e) => {
                        log::error!("Run {}: zone mint failed, aborting batch: {}", run_index, e);
                        self.abort(run_index, e.to_string());
                        return Err(e);
                    }
                }
            }
            ZoneDecision::Skip => {
                log::debug!("Run {}: skipped new {:?} zone", run_index, prompt.role);
                None
            }
        };

        // A zone minted for the start point may already cover the end point
        let radius = self.config.discovery.discovery_radius_km;
        let grid = &self.grid;
        self.prompts.retain(|p| grid.nearest(p.location.lat, p.location.lng, radius).is_none());

        self.state = if self.prompts.is_empty() {
            WorkflowState::Finalizing { run_index }
        } else {
            WorkflowState::AwaitingZoneDecision { run_index, pending: self.prompts.len() }
        };
        Ok(created)
    }

    /// Allocate the current run's reward and persist it
    pub fn finalize_current<F>(&mut self, persist: F) -> Result<()>
    where
        F: FnOnce(&FinalizedRun) -> anyhow::Result<()>,
    {
        let WorkflowState::Finalizing { run_index } = self.state else {
            return Err(CoreError::InvalidState(format!("cannot finalize in {:?}", self.state)));
        };
        let (_, run) = self
            .current
            .take()
            .ok_or_else(|| CoreError::InvalidState("no run being finalized".to_string()))?;

        let allocation =
            match self.allocator.allocate(&run, &self.grid, self.runner_id.as_deref(), (self.clock)())
            {
                Ok(allocation) => allocation,
                Err(e) => {
                    log::error!("Run {}: allocation failed, aborting batch: {}", run_index, e);
                    self.abort(run_index, e.to_string());
                    return Err(e);
                }
            };
        let finalized = self.build_finalized(run_index, run, allocation);

        if let Err(e) = persist(&finalized) {
            let reason = format!("{:#}", e);
            log::error!("Run {}: persist failed, aborting batch: {}", run_index, reason);
            self.abort(run_index, reason.clone());
            return Err(CoreError::Persistence(reason));
        }

        self.apply_finalized(&finalized)?;
        log::info!(
            "Run {} finalized: {:.2} km, reward {:.2}, {} zone(s) credited",
            run_index,
            finalized.run.total_km,
            finalized.allocation.runner_reward,
            finalized.allocation.zone_km_buckets.len()
        );
        self.advance();
        Ok(())
    }

    /// `finalize_current` against a `ZoneStore`
    pub fn finalize_with_store<S: ZoneStore>(&mut self, store: &mut S) -> Result<()> {
        self.finalize_current(|finalized| store.commit_run(finalized))
    }

    /// Drive a whole batch: `confirm` answers zone prompts, `persist` writes
    /// each finalized run. Stops at the first persist failure.
    pub fn run_batch<C, P>(
        &mut self,
        runs: Vec<ValidatedRun>,
        mut confirm: C,
        mut persist: P,
    ) -> Result<BatchSummary>
    where
        C: FnMut(&ZonePrompt) -> ZoneDecision,
        P: FnMut(&FinalizedRun) -> anyhow::Result<()>,
    {
        self.start_batch(runs)?;
        loop {
            match self.state {
                WorkflowState::AwaitingZoneDecision { .. } => {
                    let prompt = self.current_prompt().cloned().ok_or_else(|| {
                        CoreError::InvalidState("awaiting decision without prompt".to_string())
                    })?;
                    let decision = confirm(&prompt);
                    self.resolve_prompt(decision)?;
                }
                WorkflowState::Finalizing { .. } => {
                    self.finalize_current(|finalized| persist(finalized))?;
                }
                WorkflowState::BatchComplete => return Ok(self.summary.clone()),
                ref other => {
                    return Err(CoreError::InvalidState(format!(
                        "batch stalled in {:?}",
                        other
                    )))
                }
            }
        }
    }

    /// Move to the next run that needs work, or complete the batch
    fn advance(&mut self) {
        while let Some((run_index, run)) = self.queue.pop_front() {
            if !run.is_valid {
                log::warn!(
                    "Run {} skipped: {}",
                    run_index,
                    run.failure_reason().unwrap_or("not validated")
                );
                self.summary.runs_rejected += 1;
                continue;
            }
            if !run.fingerprint.is_empty() && self.finalized_fingerprints.contains(&run.fingerprint)
            {
                log::warn!("Run {} skipped: duplicate of a run already in this batch", run_index);
                self.summary.duplicates_skipped += 1;
                continue;
            }

            self.state = WorkflowState::Analyzing { run_index };
            self.prompts = self.analyze(run_index, &run);
            self.current = Some((run_index, run));
            self.state = if self.prompts.is_empty() {
                WorkflowState::Finalizing { run_index }
            } else {
                WorkflowState::AwaitingZoneDecision { run_index, pending: self.prompts.len() }
            };
            return;
        }

        self.current = None;
        self.summary.total_reward = round_currency(self.reward_exact);
        self.state = WorkflowState::BatchComplete;
        log::info!(
            "Batch complete: {} runs, {:.2} km, reward {:.2}, {} new zone(s)",
            self.summary.runs_finalized,
            self.summary.total_km,
            self.summary.total_reward,
            self.summary.zones_created
        );
    }

    /// Prompts for endpoints with no zone inside the discovery radius. A loop
    /// (start and end close together) yields at most one prompt.
    fn analyze(&self, run_index: usize, run: &ValidatedRun) -> VecDeque<ZonePrompt> {
        let mut prompts = VecDeque::new();
        let Some((start, end)) = run.endpoints() else {
            return prompts;
        };
        let discovery = &self.config.discovery;
        let start_geo = start.geo();
        let end_geo = end.geo();
        let is_loop = start_geo.distance_km(&end_geo) <= discovery.loop_radius_km;

        let mut candidates = vec![(ZoneRole::Start, start_geo)];
        if !is_loop {
            candidates.push((ZoneRole::End, end_geo));
        }

        for (role, location) in candidates {
            if self.grid.nearest(location.lat, location.lng, discovery.discovery_radius_km).is_some()
            {
                continue;
            }
            let suggested_group = self
                .grid
                .nearest_matching(location.lat, location.lng, |_| true)
                .map(|(zone, _)| zone.group_key.clone());
            prompts.push_back(ZonePrompt {
                run_index,
                role,
                location,
                suggested_group,
                mint_cost: self.config.economy.zone_mint_cost,
            });
        }

        if !prompts.is_empty() {
            log::debug!("Run {}: {} new zone(s) to confirm", run_index, prompts.len());
        }
        prompts
    }

    fn mint_zone(
        &mut self,
        prompt: &ZonePrompt,
        name: String,
        group_key: Option<String>,
    ) -> Result<Zone> {
        let group_key = group_key
            .or_else(|| prompt.suggested_group.clone())
            .unwrap_or_else(|| UNKNOWN_GROUP.to_string());
        let mut zone = Zone::new(ZoneId::generate(), name, group_key, AxialCoord::ORIGIN, prompt.location);

        let placement = self.resolver.place(zone.clone(), &mut self.grid)?;
        for displacement in &placement.displaced {
            self.journal.push(JournalEntry::Moved {
                zone_id: displacement.zone.id.clone(),
                from: displacement.from,
            });
        }
        self.journal.push(JournalEntry::Created(zone.id.clone()));
        self.grid.mark_pending(&zone.id);

        zone.coord = placement.coord;
        self.summary.zones_created += 1;
        self.summary.mint_cost += prompt.mint_cost;
        log::info!(
            "Minted zone '{}' ({}) at {}, {} zone(s) displaced",
            zone.name,
            zone.group_key,
            zone.coord,
            placement.displaced.len()
        );
        Ok(zone)
    }

    fn build_finalized(
        &self,
        run_index: usize,
        run: ValidatedRun,
        allocation: RewardAllocation,
    ) -> FinalizedRun {
        let mut created_zones = Vec::new();
        let mut touched: Vec<ZoneId> = Vec::new();
        for entry in &self.journal {
            let id = match entry {
                JournalEntry::Created(id) => {
                    created_zones.push(id.clone());
                    id
                }
                JournalEntry::Moved { zone_id, .. } => zone_id,
            };
            if !touched.contains(id) {
                touched.push(id.clone());
            }
        }

        // Reward deltas carry the freshest copy of a credited zone
        let mut zone_deltas: Vec<Zone> = touched
            .iter()
            .filter(|id| !allocation.zone_km_buckets.contains_key(*id))
            .filter_map(|id| self.grid.get(id).cloned())
            .collect();
        zone_deltas.extend(allocation.zone_deltas.iter().cloned());

        FinalizedRun {
            run_index,
            runner_id: self.runner_id.clone(),
            run,
            allocation,
            created_zones,
            zone_deltas,
        }
    }

    fn apply_finalized(&mut self, finalized: &FinalizedRun) -> Result<()> {
        for delta in &finalized.allocation.zone_deltas {
            self.grid.upsert(delta.clone())?;
        }
        for id in &finalized.created_zones {
            self.grid.commit(id);
        }
        self.journal.clear();

        if !finalized.run.fingerprint.is_empty() {
            self.finalized_fingerprints.insert(finalized.run.fingerprint.clone());
        }
        self.summary.runs_finalized += 1;
        self.summary.total_km += finalized.run.total_km;
        self.reward_exact += finalized.allocation.runner_reward_exact;
        self.summary.any_reinforced |= finalized.allocation.is_reinforced;
        for credit in &finalized.allocation.credits {
            if !self.summary.zone_names.contains(&credit.zone_name) {
                self.summary.zone_names.push(credit.zone_name.clone());
            }
        }
        Ok(())
    }

    /// Drop the current run's grid changes and everything still queued
    fn abort(&mut self, run_index: usize, reason: String) {
        self.rollback_current();
        self.queue.clear();
        self.prompts.clear();
        self.current = None;
        self.state = WorkflowState::Aborted { run_index, reason };
    }

    /// Undo this run's minting and pushes, newest first
    fn rollback_current(&mut self) {
        while let Some(entry) = self.journal.pop() {
            match entry {
                JournalEntry::Created(id) => {
                    self.grid.remove(&id);
                    self.summary.zones_created = self.summary.zones_created.saturating_sub(1);
                    self.summary.mint_cost -= self.config.economy.zone_mint_cost;
                }
                JournalEntry::Moved { zone_id, from } => {
                    if let Err(e) = self.grid.move_zone(&zone_id, from) {
                        log::error!("Rollback could not return zone {} to {}: {}", zone_id, from, e);
                    }
                }
            }
        }
    }
}
