// bank0-core – Error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error shared by every bank0 crate.
///
/// Every variant carries owned strings so the error can be cloned, logged and
/// serialised for a display surface without borrowing from the failing call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Bank0Error {
    /// The enrollment lacks (or carries unusable) OTP parameters.
    #[error("Unsupported enrollment: {0}")]
    UnsupportedEnrollment(String),

    /// The shared secret could not be decoded.
    #[error("Unable to generate OTP: could not decode secret ({0})")]
    InvalidSecret(String),

    /// A push notification targets a different enrollment than the one held.
    #[error("Notification doesn't match enrollment ({notification} != {enrollment})")]
    EnrollmentMismatch {
        notification: String,
        enrollment: String,
    },

    /// The identity service no longer knows this enrollment.
    #[error("Enrollment not found: {0}")]
    EnrollmentNotFound(String),

    /// Any failure talking to the identity or consent service.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No enrollment is held on this device")]
    NotEnrolled,

    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Bank0Error {
    /// Build a mismatch error from the two ids involved.
    pub fn mismatch(notification: impl Into<String>, enrollment: impl Into<String>) -> Self {
        Self::EnrollmentMismatch {
            notification: notification.into(),
            enrollment: enrollment.into(),
        }
    }

    /// `true` for errors raised by an external service.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::EnrollmentNotFound(_))
    }
}

impl From<std::io::Error> for Bank0Error {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Bank0Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// Display surfaces only deal in strings
impl From<Bank0Error> for String {
    fn from(e: Bank0Error) -> Self {
        e.to_string()
    }
}

pub type Bank0Result<T> = Result<T, Bank0Error>;
