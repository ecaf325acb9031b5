//! # zone_core - Territory engine for exercise-to-earn running
//!
//! Turns uploaded GPS tracks into validated runs, places newly discovered
//! zones on a collision-free hex grid, and splits run rewards between the
//! runner and zone pools.
//!
//! ## Features
//! - Anti-cheat run validation (distance, duration and speed gates)
//! - Anchor-and-push zone placement that keeps one zone per hex cell
//! - Per-zone reward buckets with boost-aware rates
//! - Batch workflow with zone prompts and rollback on failed persistence
//! - JSON API and compressed grid snapshots

// Cosmetic doc lints, fix incrementally
#![allow(clippy::doc_lazy_continuation)]

pub mod api;
pub mod config;
pub mod error;
pub mod geo;
pub mod grid;
pub mod models;
pub mod placement;
pub mod reward;
pub mod save;
pub mod validation;
pub mod workflow;

// Re-export main API functions
pub use api::{
    allocate_reward, allocate_reward_json, find_nearest_zone, resolve_placement,
    resolve_placement_json, run_batch, run_batch_json, validate_run, validate_run_json,
};
pub use config::{AntiCheatConfig, DiscoveryConfig, EconomyConfig, GameConfig, DEFAULT_CONFIG};
pub use error::{CoreError, Result};

pub use geo::{bearing_deg, bearing_to_hex_direction, haversine_km, hex_distance, AxialCoord, HexDirection};
pub use grid::HexGridIndex;
pub use models::{GeoPoint, GpsPoint, RunRejection, ValidatedRun, Zone, ZoneId};
pub use placement::{PlacementResult, ZonePlacementResolver};
pub use reward::{RewardAllocation, RewardAllocator};
pub use validation::RunValidator;

// Re-export workflow
pub use workflow::{
    AccountSessions, BatchSummary, FinalizedRun, MemoryZoneStore, RunWorkflowOrchestrator,
    WorkflowState, ZoneDecision, ZonePrompt, ZoneStore,
};

// Re-export save system
pub use save::{load_snapshot, save_snapshot, GridSnapshot, SaveError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SCHEMA_VERSION: u8 = 1;
