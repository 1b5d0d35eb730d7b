
use std::cell::RefCell;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use super::VectorRecord;
use crate::{RagError, Result};

/// Result of reading a persisted snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotRead {
    /// Nothing has been persisted yet
    Missing,
    /// The snapshot exists but could not be read
    Unreadable(String),
    /// The snapshot was read but could not be decoded
    Corrupt(String),
    Loaded(Vec<VectorRecord>),
}

/// Durable storage for the full ordered record sequence.
///
/// Every write replaces the previous snapshot wholesale.
pub trait Snapshot {
    fn read(&self) -> SnapshotRead;
    fn write(&self, records: &[VectorRecord]) -> Result<()>;
    fn clear(&self) -> Result<()>;
    /// Human readable location, used in log messages
    fn location(&self) -> String;
}

#[inline]
pub fn encode(records: &[VectorRecord]) -> Result<Vec<u8>> {
    serde_json::to_vec(records)
        .map_err(|e| RagError::Store(format!("Failed to encode vector records: {}", e)))
}

#[inline]
pub fn decode(bytes: &[u8]) -> std::result::Result<Vec<VectorRecord>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// JSON snapshot on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move a snapshot that failed to decode out of the way so the next write does not destroy it
    fn quarantine(&self) {
        let backup_path = self.path.with_extension("corrupted_backup");
        match fs::rename(&self.path, &backup_path) {
            Ok(()) => info!("Corrupted snapshot backed up to {}", backup_path.display()),
            Err(e) => error!("Failed to back up corrupted snapshot: {}", e),
        }
    }
}

impl Snapshot for FileSnapshot {
    fn read(&self) -> SnapshotRead {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot at {}", self.path.display());
                return SnapshotRead::Missing;
            }
            Err(e) => return SnapshotRead::Unreadable(e.to_string()),
        };

        match decode(&bytes) {
            Ok(records) => SnapshotRead::Loaded(records),
            Err(e) => {
                warn!("Snapshot at {} is corrupt: {}", self.path.display(), e);
                self.quarantine();
                SnapshotRead::Corrupt(e.to_string())
            }
        }
    }

    fn write(&self, records: &[VectorRecord]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| {
            RagError::Store(format!(
                "Failed to create snapshot directory {}: {}",
                parent.display(),
                e
            ))
        })?;

        let bytes = encode(records)?;

        // Write beside the target and rename so a crash never leaves a torn snapshot
        let mut file = NamedTempFile::new_in(parent)
            .map_err(|e| RagError::Store(format!("Failed to create temporary snapshot: {}", e)))?;
        file.write_all(&bytes)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| RagError::Store(format!("Failed to write snapshot: {}", e)))?;
        file.persist(&self.path).map_err(|e| {
            RagError::Store(format!(
                "Failed to replace snapshot {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        debug!(
            "Wrote {} records ({} bytes) to {}",
            records.len(),
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::Store(format!(
                "Failed to remove snapshot {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process snapshot holding encoded bytes, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    bytes: RefCell<Option<Vec<u8>>>,
}

impl MemorySnapshot {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from arbitrary persisted bytes, valid or not
    #[inline]
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: RefCell::new(Some(bytes.into())),
        }
    }

    #[inline]
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes.borrow().clone()
    }
}

impl Snapshot for MemorySnapshot {
    fn read(&self) -> SnapshotRead {
        match self.bytes.borrow().as_deref() {
            None => SnapshotRead::Missing,
            Some(bytes) => match decode(bytes) {
                Ok(records) => SnapshotRead::Loaded(records),
                Err(e) => SnapshotRead::Corrupt(e.to_string()),
            },
        }
    }

    fn write(&self, records: &[VectorRecord]) -> Result<()> {
        let bytes = encode(records)?;
        *self.bytes.borrow_mut() = Some(bytes);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.bytes.borrow_mut() = None;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

impl<S: Snapshot + ?Sized> Snapshot for &S {
    fn read(&self) -> SnapshotRead {
        (**self).read()
    }

    fn write(&self, records: &[VectorRecord]) -> Result<()> {
        (**self).write(records)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn location(&self) -> String {
        (**self).location()
    }
}
