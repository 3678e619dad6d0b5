//! # bank0 – Enrollment Store
//!
//! Device-local persistence for the single current enrollment:
//!
//! - **Preferences** – string key/value stores (JSON file or in-memory)
//! - **Enrollment slot** – save / load / clear of the enrollment record

pub mod enrollment_store;
pub mod prefs;

pub use enrollment_store::{EnrollmentStore, EnrollmentStoreState, ENROLLMENT_KEY};
pub use prefs::{JsonFilePreferences, MemoryPreferences, PreferenceStore};
