pub mod resolver;

pub use resolver::{Anchor, AnchorKind, Displacement, PlacementResult, ZonePlacementResolver};
