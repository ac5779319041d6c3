// src/state/store.rs

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::fs::FileSystem;

/// One decoded artifact, valid for exactly one observed mtime.
struct CacheEntry {
    modified: SystemTime,
    value: Box<dyn Any + Send>,
}

/// Typed, mtime-cached reader of small status artifacts.
///
/// The consumers of fleet status tick several times per second over a handful
/// of files per instrument; re-reading and re-parsing each of them every tick
/// is what this cache removes. A file is read and decoded again only when its
/// modification time differs from the one stored with the cached value.
///
/// This is the only component that touches status files on disk.
pub struct StateStore {
    fs: Arc<dyn FileSystem>,
    cache: HashMap<PathBuf, CacheEntry>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("fs", &self.fs)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl StateStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: HashMap::new(),
        }
    }

    /// Read `path`, decode it with `decode` and return the value.
    ///
    /// - If the path cannot be stat'ed, `default` is returned and the cache is
    ///   left alone.
    /// - If the cached entry has the same mtime, the cached value is returned
    ///   without reading or decoding.
    /// - A failed read or decode returns `default` and stores nothing, so the
    ///   next call tries again (the writer may have been mid-write).
    pub fn get<T, F>(&mut self, path: &Path, decode: F, default: T) -> T
    where
        T: Clone + Send + 'static,
        F: FnOnce(&str) -> Result<T>,
    {
        let modified = match self.fs.modified(path) {
            Ok(m) => m,
            Err(_) => return default,
        };

        if let Some(entry) = self.cache.get(path) {
            if entry.modified == modified {
                if let Some(value) = entry.value.downcast_ref::<T>() {
                    return value.clone();
                }
            }
        }

        let text = match self.fs.read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = ?path, error = %err, "status artifact vanished between stat and read");
                return default;
            }
        };

        match decode(&text) {
            Ok(value) => {
                debug!(path = ?path, "status artifact changed; cache refreshed");
                self.cache.insert(
                    path.to_path_buf(),
                    CacheEntry {
                        modified,
                        value: Box::new(value.clone()),
                    },
                );
                value
            }
            Err(err) => {
                debug!(path = ?path, error = %err, "status artifact not decodable yet; treating as no data");
                default
            }
        }
    }

    /// Modification time of `path`, if it exists.
    pub fn modified(&self, path: &Path) -> Option<SystemTime> {
        self.fs.modified(path).ok()
    }

    /// Serialise `value` as JSON and write it to `path`.
    pub fn write_json<T: Serialize>(&mut self, path: &Path, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value)?;
        self.fs.write(path, &body)?;
        self.cache.remove(path);
        Ok(())
    }

    /// Drop any cached value for `path`.
    pub fn invalidate(&mut self, path: &Path) {
        if self.cache.remove(path).is_some() {
            debug!(path = ?path, "invalidated cached status artifact");
        }
    }

    /// Number of cached artifacts.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
