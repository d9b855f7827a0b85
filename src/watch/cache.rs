// src/watch/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Content hash of a file (hex blake3).
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let bytes = fs.read(path)?;
    let mut hasher = Hasher::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Outcome of [`FileCache::swap`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HashSwap {
    /// Hash on record before this change, if any.
    pub previous: Option<String>,
    /// The file could not be read any more.
    pub removed: bool,
}

/// Last known content hash of every file the engine has seen change.
///
/// Supplies the "previous version" handed to the optimistic build predicate.
#[derive(Debug)]
pub struct FileCache {
    fs: Arc<dyn FileSystem>,
    hashes: HashMap<PathBuf, String>,
}

impl FileCache {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            hashes: HashMap::new(),
        }
    }

    /// Hash currently on record, without touching the disk.
    pub fn get(&self, path: &Path) -> Option<&str> {
        self.hashes.get(path).map(String::as_str)
    }

    /// Record the file's current hash and return the one it replaced.
    ///
    /// A file that can no longer be read (deleted) is forgotten and reported
    /// as removed.
    pub fn swap(&mut self, path: &Path) -> HashSwap {
        match compute_file_hash(self.fs.as_ref(), path) {
            Ok(hash) => {
                debug!(?path, %hash, "updated file hash");
                HashSwap {
                    previous: self.hashes.insert(path.to_path_buf(), hash),
                    removed: false,
                }
            }
            Err(err) => {
                debug!(?path, error = %err, "file not readable; forgetting hash");
                HashSwap {
                    previous: self.hashes.remove(path),
                    removed: true,
                }
            }
        }
    }

    /// Seed the cache without reporting anything.
    pub fn prime<'a, I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = &'a Path>,
    {
        for path in paths {
            self.swap(path);
        }
    }
}
