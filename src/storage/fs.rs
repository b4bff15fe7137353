use anyhow::{Context, Result};
use directories_next::BaseDirs;
use log::warn;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::storage::KvStore;

fn default_store_path() -> Result<PathBuf> {
    let mut path = BaseDirs::new()
        .context("could not locate system directories")?
        .data_dir()
        .to_path_buf();
    path.push("exam-sim");
    path.push("store.json");
    Ok(path)
}

/// [`KvStore`] persisted as a single JSON file. The whole map is rewritten on
/// every mutation; a failed rewrite leaves the in-memory entries in place so
/// the caller can warn about non-durable edits.
pub struct FileKvStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileKvStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("could not read {}", path.display()))?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("discarding corrupt store file {}: {}", path.display(), e);
                HashMap::new()
            })
        } else {
            HashMap::new()
        };
        Ok(FileKvStore {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_store_path()?)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("could not write {}", self.path.display()))?;
        Ok(())
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_owned(), value.to_owned());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write();
        entries.remove(key);
        if let Err(e) = self.persist(&entries) {
            warn!("could not persist removal of {}: {}", key, e);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}
