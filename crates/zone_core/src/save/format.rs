use super::error::SaveError;
use super::SNAPSHOT_VERSION;
use crate::grid::HexGridIndex;
use crate::models::Zone;
use serde::{Deserialize, Serialize};

use chrono::Utc;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use rmp_serde::{from_slice, to_vec_named};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

const CHECKSUM_LEN: usize = 32;

/// Persisted copy of a zone grid
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    /// Snapshot format version for migration
    pub version: u32,

    /// Creation time (unix milliseconds)
    pub created_at: i64,

    /// Zones in grid insertion order
    pub zones: Vec<Zone>,
}

impl GridSnapshot {
    pub fn from_grid(grid: &HexGridIndex) -> Self {
        Self { version: SNAPSHOT_VERSION, created_at: current_timestamp(), zones: grid.to_vec() }
    }

    /// Rebuild the index; duplicate coordinates mean the snapshot is corrupt
    pub fn into_grid(self) -> Result<HexGridIndex, SaveError> {
        HexGridIndex::from_zones(self.zones).map_err(|e| SaveError::Corrupted(e.to_string()))
    }
}

/// Serialize, compress and seal a snapshot
pub fn serialize_and_compress(snapshot: &GridSnapshot) -> Result<Vec<u8>, SaveError> {
    // 1. MessagePack with field names
    let msgpack = to_vec_named(snapshot)?;

    // 2. LZ4 (size prepended)
    let mut sealed = compress_prepend_size(&msgpack);

    // 3. SHA256 of the compressed payload as trailer
    let checksum = Sha256::digest(&sealed);
    sealed.extend_from_slice(&checksum);

    Ok(sealed)
}

/// Verify, decompress and deserialize a snapshot
pub fn decompress_and_deserialize(bytes: &[u8]) -> Result<GridSnapshot, SaveError> {
    if bytes.len() < 4 + CHECKSUM_LEN {
        return Err(SaveError::Corrupted(format!("snapshot too small: {} bytes", bytes.len())));
    }

    let (payload, checksum_bytes) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if Sha256::digest(payload).as_slice() != checksum_bytes {
        return Err(SaveError::ChecksumMismatch);
    }

    let msgpack = decompress_size_prepended(payload).map_err(|_| SaveError::Decompression)?;
    let snapshot: GridSnapshot = from_slice(&msgpack)?;

    if snapshot.version > SNAPSHOT_VERSION {
        return Err(SaveError::VersionMismatch {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    Ok(snapshot)
}

pub fn save_snapshot(path: &Path, grid: &HexGridIndex) -> Result<(), SaveError> {
    let bytes = serialize_and_compress(&GridSnapshot::from_grid(grid))?;
    // Write-then-rename: the target is replaced in one step
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    log::debug!("Saved {} bytes to {:?}", bytes.len(), path);
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<HexGridIndex, SaveError> {
    let bytes = fs::read(path)?;
    log::debug!("Loaded {} bytes from {:?}", bytes.len(), path);
    decompress_and_deserialize(&bytes)?.into_grid()
}

pub fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}
