//! DUALLOG - Store Snapshots
//! Persists a `MemoryStore` keyspace to a single file.
//!
//! ## Binary Format
//! ```text
//! [magic: "DLSN"][body_len: 4 bytes (LE)][body: bincode][crc: 4 bytes (LE) over magic+len+body]
//! ```

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DualLogError, Result};
use crate::types::Score;

const SNAPSHOT_MAGIC: &[u8; 4] = b"DLSN";

/// One key of the keyspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: SnapshotValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapshotValue {
    Str(Vec<u8>),
    /// `(score, member)` pairs in ascending score order.
    Sorted(Vec<(Score, Vec<u8>)>),
    /// Head first.
    List(Vec<Vec<u8>>),
}

/// Encode entries into the snapshot format.
pub fn encode(entries: &[SnapshotEntry]) -> Result<Vec<u8>> {
    let body = bincode::serialize(entries)?;
    let body_len = u32::try_from(body.len())
        .map_err(|_| DualLogError::Serialization("snapshot exceeds 4 GiB".into()))?;

    let mut buf = Vec::with_capacity(body.len() + 12);
    buf.extend_from_slice(SNAPSHOT_MAGIC);
    buf.extend_from_slice(&body_len.to_le_bytes());
    buf.extend_from_slice(&body);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Decode a buffer produced by [`encode`], verifying magic, length and CRC.
pub fn decode(buf: &[u8]) -> Result<Vec<SnapshotEntry>> {
    if buf.len() < 12 || &buf[..4] != SNAPSHOT_MAGIC {
        return Err(DualLogError::Corruption("not a duallog snapshot".into()));
    }

    let body_len = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
    if buf.len() != body_len + 12 {
        return Err(DualLogError::Corruption(format!(
            "snapshot length mismatch: header says {} body bytes, file has {}",
            body_len,
            buf.len() - 12
        )));
    }

    let (covered, trailer) = buf.split_at(8 + body_len);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = crc32fast::hash(covered);
    if stored != computed {
        return Err(DualLogError::Corruption(format!(
            "snapshot CRC mismatch: stored {:#010x}, computed {:#010x}",
            stored, computed
        )));
    }

    Ok(bincode::deserialize(&covered[8..])?)
}

/// Encode and write entries to `path`, syncing before returning.
pub fn write_file(path: &Path, entries: &[SnapshotEntry]) -> Result<()> {
    let encoded = encode(entries)?;
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(&encoded)?;
    file.sync_all()?;
    Ok(())
}

/// Read and decode the snapshot at `path`.
pub fn read_file(path: &Path) -> Result<Vec<SnapshotEntry>> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    decode(&buf)
}
