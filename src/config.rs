//! # Application Configuration
//!
//! JSON configuration for the authenticator. Every field has a default, so a
//! missing file or an empty object is a valid configuration.
//!
//! ```json
//! {
//!   "guardian_url": "https://bank0.guardian.example.com/",
//!   "tenant_url": "https://bank0.example.com",
//!   "authorizing_client_id": "cli_123",
//!   "store_path": "/var/lib/bank0/preferences.json",
//!   "code": { "warn_window_ms": 5000, "boundary_skew_ms": 100 },
//!   "log_filter": "info"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use bank0_core::{Bank0Error, Bank0Result};
use bank0_guardian::ConsentClient;
use bank0_totp::totp::TickerSettings;
use serde::{Deserialize, Serialize};

/// Default `tracing` filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Sub-directory of the platform data directory holding the store.
const DATA_DIR_NAME: &str = "bank0";
const STORE_FILE_NAME: &str = "preferences.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Identity service base URL.
    pub guardian_url: String,
    /// Consent service base URL.
    pub tenant_url: String,
    /// Issuer of consent request tokens.
    pub authorizing_client_id: String,
    /// Preference file; `None` selects the platform data directory.
    pub store_path: Option<PathBuf>,
    /// Code ticker timing.
    pub code: TickerSettings,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            guardian_url: String::new(),
            tenant_url: String::new(),
            authorizing_client_id: String::new(),
            store_path: None,
            code: TickerSettings::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults; an unreadable or
    /// malformed one is a `Config` error.
    pub fn load(path: &Path) -> Bank0Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).map_err(|e| {
            Bank0Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&data)
            .map_err(|e| Bank0Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(json: &str) -> Bank0Result<Self> {
        serde_json::from_str(json).map_err(|e| Bank0Error::Config(e.to_string()))
    }

    /// Preference file in use: the configured path, else
    /// `<data dir>/bank0/preferences.json`.
    pub fn resolved_store_path(&self) -> Bank0Result<PathBuf> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(DATA_DIR_NAME).join(STORE_FILE_NAME))
            .ok_or_else(|| {
                Bank0Error::Config("no platform data directory; set store_path".into())
            })
    }

    /// Consent client for the configured tenant.
    pub fn consent_client(&self) -> Bank0Result<ConsentClient> {
        if self.tenant_url.is_empty() {
            return Err(Bank0Error::Config("tenant_url is not set".into()));
        }
        if self.authorizing_client_id.is_empty() {
            return Err(Bank0Error::Config("authorizing_client_id is not set".into()));
        }
        ConsentClient::new(&self.tenant_url, &self.authorizing_client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_all_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.code.warn_window_ms, 5_000);
        assert_eq!(config.code.boundary_skew_ms, 100);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn partial_code_section_keeps_other_defaults() {
        let config = AppConfig::from_json(
            r#"{"tenant_url": "https://bank0.example.com", "code": {"boundary_skew_ms": 250}}"#,
        )
        .unwrap();
        assert_eq!(config.tenant_url, "https://bank0.example.com");
        assert_eq!(config.code.boundary_skew_ms, 250);
        assert_eq!(config.code.warn_window_ms, 5_000);
    }

    #[test]
    fn missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank0.json");
        fs::write(&path, "{ \"code\": 5 }").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(Bank0Error::Config(_))));
    }

    #[test]
    fn explicit_store_path_wins() {
        let config = AppConfig {
            store_path: Some(PathBuf::from("/tmp/prefs.json")),
            ..AppConfig::default()
        };
        assert_eq!(
            config.resolved_store_path().unwrap(),
            PathBuf::from("/tmp/prefs.json")
        );
    }

    #[test]
    fn consent_client_requires_tenant() {
        assert!(matches!(
            AppConfig::default().consent_client(),
            Err(Bank0Error::Config(_))
        ));
        let config = AppConfig {
            tenant_url: "https://bank0.example.com".into(),
            authorizing_client_id: "cli_1".into(),
            ..AppConfig::default()
        };
        assert_eq!(
            config.consent_client().unwrap().audience(),
            "https://bank0.example.com/consents"
        );
    }
}
