use thiserror::Error;

use crate::geo::AxialCoord;
use crate::models::ZoneId;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid workflow state: {0}")]
    InvalidState(String),

    #[error("Coordinate {coord} already occupied by zone {occupant}")]
    CoordinateCollision { coord: AxialCoord, occupant: ZoneId },

    #[error("Placement chain from {origin} exceeded {depth} steps (grid corrupted?)")]
    PlacementExhausted { depth: usize, origin: AxialCoord },

    #[error("Run cannot be rewarded: {0}")]
    InvalidRun(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Errors that indicate broken grid invariants rather than bad input.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, CoreError::CoordinateCollision { .. } | CoreError::PlacementExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
