//! # Enrollment Store
//!
//! Persists the single device enrollment under one preference key as its
//! JSON form. Key absence means "not enrolled".
//!
//! ## Example
//!
//! ```rust,no_run
//! use bank0_core::Enrollment;
//! use bank0_storage::EnrollmentStore;
//!
//! # fn example() -> bank0_core::Bank0Result<()> {
//! let store = EnrollmentStore::open("preferences.json");
//! let enrollment = Enrollment::new("dev_1", "alice", "device", "Pixel", "push", "token");
//! store.save(&enrollment)?;
//! assert_eq!(store.load()?, Some(enrollment));
//! store.clear()?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bank0_core::{Bank0Result, Enrollment};
use log::{debug, info};

use crate::prefs::{JsonFilePreferences, MemoryPreferences, PreferenceStore};

/// Preference key holding the enrollment JSON.
pub const ENROLLMENT_KEY: &str = "enrollment";

/// Shared handle to the enrollment store.
pub type EnrollmentStoreState = Arc<EnrollmentStore>;

/// Single-slot store for the current enrollment.
pub struct EnrollmentStore {
    prefs: Box<dyn PreferenceStore>,
    /// Held for the duration of every save and clear
    writer: Mutex<()>,
}

impl EnrollmentStore {
    /// Creates a store over any preference backend.
    pub fn new(prefs: impl PreferenceStore + 'static) -> Self {
        Self {
            prefs: Box::new(prefs),
            writer: Mutex::new(()),
        }
    }

    /// Creates a store backed by a JSON preference file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFilePreferences::new(path))
    }

    /// Creates a store that forgets everything on exit.
    pub fn in_memory() -> Self {
        Self::new(MemoryPreferences::new())
    }

    /// Wraps the store for sharing between threads.
    pub fn shared(self) -> EnrollmentStoreState {
        Arc::new(self)
    }

    /// Replaces the stored enrollment.
    ///
    /// A ticker already bound to a previous enrollment keeps running; callers
    /// re-bind explicitly.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` or `Storage` if the record cannot be written.
    pub fn save(&self, enrollment: &Enrollment) -> Bank0Result<()> {
        let json = enrollment.to_json()?;
        let _guard = self.write_guard();
        self.prefs.set(ENROLLMENT_KEY, &json)?;
        info!("Saved enrollment {}", enrollment.id());
        Ok(())
    }

    /// Returns the stored enrollment, or `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// A record that exists but does not parse is reported as `Serialization`,
    /// never as `None`.
    pub fn load(&self) -> Bank0Result<Option<Enrollment>> {
        match self.prefs.get(ENROLLMENT_KEY)? {
            Some(json) => Ok(Some(Enrollment::from_json(&json)?)),
            None => {
                debug!("No enrollment stored");
                Ok(None)
            }
        }
    }

    /// Removes the stored enrollment. Clearing an empty store is a no-op.
    pub fn clear(&self) -> Bank0Result<()> {
        let _guard = self.write_guard();
        self.prefs.remove(ENROLLMENT_KEY)?;
        info!("Cleared stored enrollment");
        Ok(())
    }

    /// Checks whether an enrollment is stored.
    pub fn is_enrolled(&self) -> Bank0Result<bool> {
        self.prefs.contains(ENROLLMENT_KEY)
    }

    fn write_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for EnrollmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentStore").finish_non_exhaustive()
    }
}
