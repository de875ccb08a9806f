//! Snapshot persistence
//!
//! The durable medium is an opaque blob sink. Snapshots are versioned bincode
//! containers holding every entry (embeddings included) and the size counter.
//! A missing or corrupt snapshot loads as an empty store; durability is
//! best-effort and never a correctness requirement of the in-memory state.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::entry::MemoryEntry;
use crate::error::Result;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Opaque durable key-value blob sink
pub trait BlobSink: Send + Sync {
    /// Overwrite the blob stored under `key`
    fn write_blob(&self, key: &str, bytes: &[u8]) -> io::Result<()>;

    /// Read the blob stored under `key`, `None` if absent
    fn read_blob(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
}

/// Flat-file sink: one file per key under a root directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    /// Create a sink rooted at `root`, creating the directory if needed
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobSink for FileSink {
    fn write_blob(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(key);
        let tmp = self.root.join(format!("{key}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)
    }

    fn read_blob(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory sink for tests and embedders without a filesystem
#[derive(Default)]
pub struct MemorySink {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobSink for MemorySink {
    fn write_blob(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        self.blobs.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_blob(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(key).cloned())
    }
}

/// Versioned whole-store snapshot
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub entries: Vec<MemoryEntry>,
    pub current_size_bytes: u64,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Encode to the blob wire format
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a blob, tolerating damage.
    ///
    /// Returns `None` on any decode failure or unknown version; the caller
    /// starts empty rather than refusing to start.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match bincode::deserialize::<Snapshot>(bytes) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Some(snapshot),
            Ok(snapshot) => {
                log::warn!(
                    "snapshot has unknown version {}, starting empty",
                    snapshot.version
                );
                None
            }
            Err(e) => {
                log::warn!("snapshot is corrupt ({e}), starting empty");
                None
            }
        }
    }
}
