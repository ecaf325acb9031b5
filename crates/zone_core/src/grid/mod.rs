pub mod index;

pub use index::HexGridIndex;
