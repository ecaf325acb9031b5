//! Reward allocation
//!
//! Credits a validated run's distance to the zones around its start and end
//! points and splits the currency reward between the runner and each zone's
//! interest pool. Rounding to currency precision happens once, on the final
//! runner total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{DiscoveryConfig, EconomyConfig};
use crate::error::{CoreError, Result};
use crate::grid::HexGridIndex;
use crate::models::{ValidatedRun, Zone, ZoneId};

/// Currency precision of the runner payout
pub const CURRENCY_DECIMALS: i32 = 2;

pub fn round_currency(amount: f64) -> f64 {
    let factor = 10f64.powi(CURRENCY_DECIMALS);
    (amount * factor).round() / factor
}

/// Reward breakdown for one credited zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCredit {
    pub zone_id: ZoneId,
    pub zone_name: String,
    pub km: f64,
    pub rate: f64,
    pub boosted: bool,
    pub runner_share: f64,
    pub pool_share: f64,
    /// The runner owns this zone
    pub reinforced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardAllocation {
    /// Km credited per zone; empty when the run touched no zone
    pub zone_km_buckets: BTreeMap<ZoneId, f64>,
    pub credits: Vec<ZoneCredit>,
    /// Runner payout rounded to currency precision
    pub runner_reward: f64,
    /// Runner payout before rounding
    pub runner_reward_exact: f64,
    pub pool_reward: f64,
    /// No zone within the involvement radius; paid at the unzoned rate
    pub unzoned: bool,
    pub is_reinforced: bool,
    /// Updated zone records to persist, one per bucket
    pub zone_deltas: Vec<Zone>,
}

impl RewardAllocation {
    pub fn total_bucket_km(&self) -> f64 {
        self.zone_km_buckets.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RewardAllocator {
    economy: EconomyConfig,
    discovery: DiscoveryConfig,
}

impl RewardAllocator {
    pub fn new(economy: EconomyConfig, discovery: DiscoveryConfig) -> Self {
        Self { economy, discovery }
    }

    /// Allocate against the wall clock at the moment of the call
    pub fn allocate_now(
        &self,
        run: &ValidatedRun,
        grid: &HexGridIndex,
        runner_id: Option<&str>,
    ) -> Result<RewardAllocation> {
        self.allocate(run, grid, runner_id, Utc::now())
    }

    /// Compute the reward split. `now` decides which boosts are still live.
    /// The grid is not modified; apply `zone_deltas` once they are persisted.
    pub fn allocate(
        &self,
        run: &ValidatedRun,
        grid: &HexGridIndex,
        runner_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RewardAllocation> {
        if !run.is_valid {
            return Err(CoreError::InvalidRun(
                run.failure_reason().unwrap_or("run was not validated").to_string(),
            ));
        }
        let (start, end) = run
            .endpoints()
            .ok_or_else(|| CoreError::InvalidRun("run has no start/end point".to_string()))?;

        let radius = self.discovery.involvement_radius_km;
        let start_zone = grid.nearest(start.lat, start.lng, radius);
        let end_zone = grid.nearest(end.lat, end.lng, radius);

        let total_km = run.total_km;
        let buckets: Vec<(&Zone, f64)> = match (start_zone, end_zone) {
            (Some(s), Some(e)) if s.id == e.id => vec![(s, total_km)],
            (Some(s), Some(e)) => {
                let half = total_km / 2.0;
                vec![(s, half), (e, total_km - half)]
            }
            (Some(z), None) | (None, Some(z)) => vec![(z, total_km)],
            (None, None) => Vec::new(),
        };

        let mut allocation = RewardAllocation {
            zone_km_buckets: BTreeMap::new(),
            credits: Vec::with_capacity(buckets.len()),
            runner_reward: 0.0,
            runner_reward_exact: 0.0,
            pool_reward: 0.0,
            unzoned: buckets.is_empty(),
            is_reinforced: false,
            zone_deltas: Vec::with_capacity(buckets.len()),
        };

        if allocation.unzoned {
            allocation.runner_reward_exact = total_km * self.economy.unzoned_rate;
        }

        for (zone, km) in buckets {
            let boosted = zone.is_boosted(now);
            let rate = if boosted { self.economy.boosted_rate } else { self.economy.base_rate };
            let reward = km * rate;
            let runner_share = reward * self.economy.reward_split_user;
            let pool_share = reward * self.economy.reward_split_pool;
            let reinforced = runner_id.is_some_and(|runner| zone.is_owned_by(runner));

            let mut delta = zone.clone();
            delta.interest_pool += pool_share;
            delta.log_distance(km);

            allocation.zone_km_buckets.insert(zone.id.clone(), km);
            allocation.runner_reward_exact += runner_share;
            allocation.pool_reward += pool_share;
            allocation.is_reinforced |= reinforced;
            allocation.credits.push(ZoneCredit {
                zone_id: zone.id.clone(),
                zone_name: zone.name.clone(),
                km,
                rate,
                boosted,
                runner_share,
                pool_share,
                reinforced,
            });
            allocation.zone_deltas.push(delta);
        }

        allocation.runner_reward = round_currency(allocation.runner_reward_exact);
        Ok(allocation)
    }
}
