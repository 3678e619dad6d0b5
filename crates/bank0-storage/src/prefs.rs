//! # Preference Stores
//!
//! Flat string key/value persistence, the device-local equivalent of a
//! platform preferences file.
//!
//! ## Implementations
//!
//! - [`JsonFilePreferences`] keeps every key in one JSON object on disk.
//!   Writes go to a uniquely named sibling temporary file which is then
//!   renamed over the original, so a concurrent reader sees either the old
//!   or the new file, never a torn one.
//! - [`MemoryPreferences`] keeps keys in a process-local map.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bank0_core::{Bank0Error, Bank0Result};
use log::{debug, warn};

/// String key/value store.
///
/// Each individual call is atomic with respect to other calls on the same
/// store.
pub trait PreferenceStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` when absent.
    fn get(&self, key: &str) -> Bank0Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Bank0Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Bank0Result<()>;

    /// Checks whether `key` is present.
    fn contains(&self, key: &str) -> Bank0Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  JSON file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Preferences persisted as a single JSON object of string values.
#[derive(Debug)]
pub struct JsonFilePreferences {
    /// File path where the preferences are stored
    path: PathBuf,
    /// Serialises read-modify-write cycles of this process
    write_lock: Mutex<()>,
}

impl JsonFilePreferences {
    /// Creates a store backed by `path`.
    ///
    /// Nothing is touched on disk until the first write; a missing file reads
    /// as an empty store.
    ///
    /// # Arguments
    ///
    /// * `path` - The file path where preferences should be stored
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole key/value map.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the file exists but cannot be read, and
    /// `Serialization` if it is not a JSON object of strings.
    fn read_map(&self) -> Bank0Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    /// Reads the map ahead of a write. A file that no longer parses is
    /// discarded so the write can replace it; the flag reports that case.
    fn read_map_for_update(&self) -> Bank0Result<(BTreeMap<String, String>, bool)> {
        match self.read_map() {
            Ok(map) => Ok((map, false)),
            Err(Bank0Error::Serialization(e)) => {
                warn!(
                    "Discarding unreadable preferences in {}: {}",
                    self.path.display(),
                    e
                );
                Ok((BTreeMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the whole key/value map through a uniquely named temporary
    /// file in the same directory, then renames it over the original.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the parent directory cannot be created or the
    /// file cannot be written or renamed.
    fn write_map(&self, map: &BTreeMap<String, String>) -> Bank0Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let json = serde_json::to_string_pretty(map)?;
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "preferences".into());
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| {
            Bank0Error::Storage(format!(
                "could not replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        debug!("Wrote {} preference(s) to {}", map.len(), self.path.display());
        Ok(())
    }

    fn locked<T>(&self, f: impl FnOnce() -> Bank0Result<T>) -> Bank0Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn get(&self, key: &str) -> Bank0Result<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Bank0Result<()> {
        self.locked(|| {
            let (mut map, _) = self.read_map_for_update()?;
            map.insert(key.to_string(), value.to_string());
            self.write_map(&map)
        })
    }

    fn remove(&self, key: &str) -> Bank0Result<()> {
        self.locked(|| {
            let (mut map, discarded) = self.read_map_for_update()?;
            if map.remove(key).is_none() && !discarded {
                return Ok(());
            }
            self.write_map(&map)
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Memory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-local preferences, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Bank0Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Bank0Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Bank0Result<()> {
        self.values().remove(key);
        Ok(())
    }
}
