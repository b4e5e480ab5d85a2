//! Byte-oriented persistence media for the knowledge store.
//!
//! The store only needs whole-blob `write`, `read`, and `exists` keyed by a
//! relative name. [`FsMedium`] keeps blobs as files in a directory and
//! replaces them atomically; [`MemoryMedium`] keeps them in a map and can be
//! told to fail writes, which tests use to check that a failed persist
//! leaves the store unchanged.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

pub trait PersistenceMedium: Send + Sync {
    /// Replace the blob stored under `name`.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;
    /// Read the blob stored under `name`.
    fn read(&self, name: &str) -> Result<Vec<u8>>;
    fn exists(&self, name: &str) -> bool;
    /// Human-readable location, for logs and `/health`.
    fn location(&self) -> String;
}

/// Files in a single directory, written via temp file + rename.
pub struct FsMedium {
    root: PathBuf,
}

impl FsMedium {
    /// Open `root`, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::Storage(format!("cannot create {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PersistenceMedium for FsMedium {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let target = self.root.join(name);
        let tmp = self.root.join(format!(".{}.tmp", name));
        let io_err = |e: std::io::Error| Error::Storage(format!("write {}: {}", target.display(), e));

        let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        std::fs::rename(&tmp, &target).map_err(io_err)?;
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        std::fs::read(&path).map_err(|e| Error::Storage(format!("read {}: {}", path.display(), e)))
    }

    fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-memory blobs, mainly for tests.
#[derive(Default)]
pub struct MemoryMedium {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    /// Names whose writes fail with a storage error.
    failing: Mutex<Vec<String>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes to `name` fail.
    pub fn fail_writes_to(&self, name: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(name.to_string());
        }
    }

    /// Undo every [`fail_writes_to`](Self::fail_writes_to).
    pub fn heal(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    /// Copy of the blob under `name`, if any.
    pub fn snapshot(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(name).cloned()
    }
}

impl PersistenceMedium for MemoryMedium {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let failing = self
            .failing
            .lock()
            .map_err(|_| Error::Storage("medium lock poisoned".into()))?;
        if failing.iter().any(|n| n == name) {
            return Err(Error::Storage(format!("write {}: injected failure", name)));
        }
        drop(failing);
        self.blobs
            .lock()
            .map_err(|_| Error::Storage("medium lock poisoned".into()))?
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .map_err(|_| Error::Storage("medium lock poisoned".into()))?
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("read {}: not found", name)))
    }

    fn exists(&self, name: &str) -> bool {
        self.blobs
            .lock()
            .map(|b| b.contains_key(name))
            .unwrap_or(false)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
