// Grid snapshots
// MessagePack + LZ4 compression with a SHA-256 trailer and versioning

pub mod error;
pub mod format;

pub use error::SaveError;
pub use format::{
    current_timestamp, decompress_and_deserialize, load_snapshot, save_snapshot,
    serialize_and_compress, GridSnapshot,
};

pub const SNAPSHOT_VERSION: u32 = 1;
