pub mod json_api;
pub mod operations;

pub use json_api::{
    allocate_reward_json, resolve_placement_json, run_batch_json, run_batch_request, validate_run_json,
    AllocateRequest, BatchRequest, BatchResponse, PlacementRequest, TrackInput,
    ValidateRunRequest,
};
pub use operations::{
    allocate_reward, find_nearest_zone, resolve_placement, run_batch, validate_run,
};
