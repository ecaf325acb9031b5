//! Persistence seam
//!
//! The orchestrator hands every finalized run to a store in a single call.
//! A store must apply the run record and all zone updates together or not
//! at all.

use anyhow::{bail, Result};
use std::collections::HashMap;

use super::orchestrator::FinalizedRun;
use crate::models::{Zone, ZoneId};

pub trait ZoneStore {
    /// Zones of one region (group key). An empty region means every zone.
    fn load_zones(&self, region: &str) -> Result<Vec<Zone>>;

    /// Atomically write the run record and its zone updates
    fn commit_run(&mut self, finalized: &FinalizedRun) -> Result<()>;
}

/// In-process store used by the CLI and tests; keeps zones in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryZoneStore {
    zones: HashMap<ZoneId, Zone>,
    order: Vec<ZoneId>,
    runs: Vec<FinalizedRun>,
    /// Fail the commit attempt with this zero-based index
    fail_on_commit: Option<usize>,
    commit_attempts: usize,
}

impl MemoryZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zones(zones: impl IntoIterator<Item = Zone>) -> Self {
        let mut store = Self::new();
        for zone in zones {
            store.put(zone);
        }
        store
    }

    /// Make the n-th commit (zero-based) fail, for exercising abort paths
    pub fn fail_on_commit(mut self, attempt: usize) -> Self {
        self.fail_on_commit = Some(attempt);
        self
    }

    pub fn zones(&self) -> Vec<Zone> {
        self.order.iter().filter_map(|id| self.zones.get(id)).cloned().collect()
    }

    pub fn get(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn runs(&self) -> &[FinalizedRun] {
        &self.runs
    }

    fn put(&mut self, zone: Zone) {
        if !self.zones.contains_key(&zone.id) {
            self.order.push(zone.id.clone());
        }
        self.zones.insert(zone.id.clone(), zone);
    }
}

impl ZoneStore for MemoryZoneStore {
    fn load_zones(&self, region: &str) -> Result<Vec<Zone>> {
        Ok(self
            .zones()
            .into_iter()
            .filter(|z| region.is_empty() || z.group_key == region)
            .collect())
    }

    fn commit_run(&mut self, finalized: &FinalizedRun) -> Result<()> {
        let attempt = self.commit_attempts;
        self.commit_attempts += 1;
        if self.fail_on_commit == Some(attempt) {
            bail!("store unavailable (commit {})", attempt);
        }

        for zone in &finalized.zone_deltas {
            self.put(zone.clone());
        }
        self.runs.push(finalized.clone());
        Ok(())
    }
}
