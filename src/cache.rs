//! On-disk record of test files that passed, keyed by a hash of their
//! contents. With `skip_passed`, unchanged files that passed last time are
//! not run again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const CACHE_FILE: &str = ".verdict-cache.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file: PathBuf,
    pub tests: usize,
    pub duration: u64,
}

#[derive(Debug)]
pub struct PassedCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

impl PassedCache {
    pub fn location(root: &Path) -> PathBuf {
        root.join(CACHE_FILE)
    }

    /// Read the cache under `root`. A missing or unreadable cache is empty.
    pub fn load(root: &Path) -> Self {
        let path = Self::location(root);
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "discarding corrupt cache");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    /// Hex SHA-256 of a file's contents.
    pub fn hash_file(path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    pub fn get(&self, hash: &str) -> Option<&CacheEntry> {
        self.entries.get(hash)
    }

    pub fn insert(&mut self, hash: String, entry: CacheEntry) {
        self.entries.insert(hash, entry);
    }

    /// Drop entries for a file under any stale hash.
    pub fn forget(&mut self, file: &Path) {
        self.entries.retain(|_, entry| entry.file != file);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite the cache file. Last writer wins.
    pub fn store(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content).map_err(|e| Error::io(&self.path, e))?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "cache stored");
        Ok(())
    }
}
