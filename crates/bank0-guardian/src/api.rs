//! Boundary to the identity service's device API.
//!
//! The wire protocol belongs to the identity provider's SDK; this crate only
//! fixes the operations the application needs and how their failures are
//! reported.

use async_trait::async_trait;
use bank0_core::{Bank0Result, Enrollment};

use crate::notification::Notification;

/// Allow/reject of pending requests and enrollment removal.
///
/// Failures come back as `Transport`, or `EnrollmentNotFound` when the
/// service no longer knows the enrollment.
#[async_trait]
pub trait GuardianApi: Send + Sync {
    /// Approve the request carried by `notification`.
    async fn allow(&self, notification: &Notification, enrollment: &Enrollment) -> Bank0Result<()>;

    /// Deny the request carried by `notification`.
    async fn reject(&self, notification: &Notification, enrollment: &Enrollment)
        -> Bank0Result<()>;

    /// Remove the enrollment on the service side.
    async fn delete_enrollment(&self, enrollment: &Enrollment) -> Bank0Result<()>;
}
