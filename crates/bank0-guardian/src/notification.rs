//! Parsed push notification for an authentication or payment request.

use bank0_core::Bank0Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A push notification asking this device to approve or deny a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Enrollment the request targets.
    pub enrollment_id: String,
    /// Token authorising the allow/reject call. Never logged.
    pub transaction_token: String,
    /// Present only for payment requests; keys the consent record.
    #[serde(default)]
    pub transaction_linking_id: Option<String>,
    #[serde(default)]
    pub browser_name: String,
    #[serde(default)]
    pub browser_version: String,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub location: Option<String>,
    /// When the request was initiated.
    pub date: DateTime<Utc>,
}

impl Notification {
    pub fn from_json(json: &str) -> Bank0Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// `true` when the request carries a consent to approve.
    pub fn is_payment(&self) -> bool {
        self.transaction_linking_id.is_some()
    }

    /// e.g. `"Chrome, 120.0"`
    pub fn browser_label(&self) -> String {
        format!("{}, {}", self.browser_name, self.browser_version)
    }

    /// e.g. `"macOS, 14.2"`
    pub fn os_label(&self) -> String {
        format!("{}, {}", self.os_name, self.os_version)
    }
}
