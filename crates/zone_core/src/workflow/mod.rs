//! Batch run processing
//!
//! Runs in a batch are handled strictly one after another: zones minted for
//! one run must be visible when the next run is analyzed, and each run is
//! persisted before the next one starts.

pub mod orchestrator;
pub mod session;
pub mod store;

pub use orchestrator::{
    BatchSummary, FinalizedRun, RunWorkflowOrchestrator, WorkflowState, ZoneDecision, ZonePrompt,
    ZoneRole, UNKNOWN_GROUP,
};
pub use session::AccountSessions;
pub use store::{MemoryZoneStore, ZoneStore};
