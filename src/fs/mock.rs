// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: SystemTime },
    Dir,
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Logical clock: every write without an explicit mtime advances it by one second.
    clock: u64,
}

/// In-memory filesystem with a logical clock for modification times.
///
/// Clones share the same underlying state, so a test can keep one handle
/// while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.lock().entries.insert(PathBuf::from("."), MockEntry::Dir);
        fs
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only happens after a panicking test thread.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add or replace a file, stamping it with the next logical mtime.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        state.clock += 1;
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(state.clock);
        Self::insert_file(&mut state, path.as_ref(), content.into(), modified);
    }

    /// Add or replace a file with an explicit mtime (e.g. to simulate two
    /// writes landing within the filesystem's timestamp granularity).
    pub fn add_file_with_mtime(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        modified: SystemTime,
    ) {
        let mut state = self.lock();
        Self::insert_file(&mut state, path.as_ref(), content.into(), modified);
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.lock().entries.remove(path.as_ref());
    }

    /// Raw bytes of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    fn insert_file(state: &mut MockState, path: &Path, content: Vec<u8>, modified: SystemTime) {
        if let Some(parent) = path.parent() {
            Self::ensure_dirs(state, parent);
        }
        state
            .entries
            .insert(path.to_path_buf(), MockEntry::File { content, modified });
    }

    fn ensure_dirs(state: &mut MockState, path: &Path) {
        let mut current = Some(path);
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            state
                .entries
                .entry(dir.to_path_buf())
                .or_insert(MockEntry::Dir);
            current = dir.parent();
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { content, .. }) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            Some(MockEntry::Dir) => Ok(SystemTime::UNIX_EPOCH),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if let Some(MockEntry::File { .. }) = state.entries.get(path) {
            return Err(anyhow!("Not a directory: {:?}", path));
        }
        Self::ensure_dirs(&mut state, path);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        let content = match self.lock().entries.get(from) {
            Some(MockEntry::File { content, .. }) => content.clone(),
            _ => return Err(anyhow!("File not found: {:?}", from)),
        };
        self.add_file(to, content);
        Ok(())
    }
}
