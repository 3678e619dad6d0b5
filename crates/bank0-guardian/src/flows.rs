//! Approval flows for incoming notifications.
//!
//! [`AuthorizationRequest::route`] checks that a notification targets the
//! held enrollment and picks the login or payment flow. Each flow owns
//! copies of the notification and enrollment, so its network steps never
//! touch state owned by the caller.

use bank0_core::{Bank0Error, Bank0Result, Enrollment};
use log::{info, warn};

use crate::api::GuardianApi;
use crate::consent::{ConsentApi, ConsentEntity, PaymentDetails};
use crate::notification::Notification;

/// A notification matched to the held enrollment.
#[derive(Debug, Clone)]
pub enum AuthorizationRequest {
    Login(LoginRequest),
    Payment(PaymentRequest),
}

impl AuthorizationRequest {
    /// Refuses notifications for another enrollment, then routes payment
    /// requests (those with a transaction linking id) apart from logins.
    pub fn route(notification: Notification, enrollment: &Enrollment) -> Bank0Result<Self> {
        if notification.enrollment_id != enrollment.id() {
            warn!(
                "Dropping notification for enrollment {} (holding {})",
                notification.enrollment_id, enrollment.id()
            );
            return Err(Bank0Error::mismatch(
                notification.enrollment_id,
                enrollment.id(),
            ));
        }
        let enrollment = enrollment.clone();
        Ok(if notification.is_payment() {
            Self::Payment(PaymentRequest {
                notification,
                enrollment,
                consent: None,
            })
        } else {
            Self::Login(LoginRequest {
                notification,
                enrollment,
            })
        })
    }

    pub fn notification(&self) -> &Notification {
        match self {
            Self::Login(r) => &r.notification,
            Self::Payment(r) => &r.notification,
        }
    }

    pub fn is_payment(&self) -> bool {
        matches!(self, Self::Payment(_))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Login
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A plain sign-in approval.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    notification: Notification,
    enrollment: Enrollment,
}

impl LoginRequest {
    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    pub async fn allow(&self, guardian: &dyn GuardianApi) -> Bank0Result<()> {
        guardian.allow(&self.notification, &self.enrollment).await?;
        info!("Login allowed for enrollment {}", self.enrollment.id());
        Ok(())
    }

    pub async fn reject(&self, guardian: &dyn GuardianApi) -> Bank0Result<()> {
        guardian.reject(&self.notification, &self.enrollment).await?;
        info!("Login rejected for enrollment {}", self.enrollment.id());
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Payment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A payment approval backed by a consent record.
///
/// The consent decision is recorded first; the identity service is only told
/// once the consent service has accepted it.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    notification: Notification,
    enrollment: Enrollment,
    consent: Option<ConsentEntity>,
}

impl PaymentRequest {
    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    /// Consent record, once loaded.
    pub fn consent(&self) -> Option<&ConsentEntity> {
        self.consent.as_ref()
    }

    /// Payment summary of the loaded consent.
    pub fn details(&self) -> Option<PaymentDetails> {
        self.consent.as_ref()?.payment_details()
    }

    /// Fetch the consent record and return its payment summary.
    pub async fn load_details(
        &mut self,
        consent: &dyn ConsentApi,
    ) -> Bank0Result<Option<PaymentDetails>> {
        let entity = consent
            .get_consent(&self.notification, &self.enrollment)
            .await?;
        self.consent = Some(entity);
        Ok(self.details())
    }

    /// Authorize the consent from `source_account`, then allow the request.
    pub async fn allow(
        &self,
        consent: &dyn ConsentApi,
        guardian: &dyn GuardianApi,
        source_account: &str,
    ) -> Bank0Result<()> {
        let entity = self.consent.as_ref().ok_or_else(|| {
            Bank0Error::InvalidState("payment details have not been loaded".into())
        })?;
        let details = entity.with_source_account(source_account).ok_or_else(|| {
            Bank0Error::InvalidState("consent has no authorization details".into())
        })?;
        consent
            .authorize(&self.notification, &self.enrollment, &details)
            .await?;
        guardian.allow(&self.notification, &self.enrollment).await?;
        info!("Payment allowed for enrollment {}", self.enrollment.id());
        Ok(())
    }

    /// Reject the consent, then reject the request.
    pub async fn reject(
        &self,
        consent: &dyn ConsentApi,
        guardian: &dyn GuardianApi,
    ) -> Bank0Result<()> {
        consent.reject(&self.notification, &self.enrollment).await?;
        guardian.reject(&self.notification, &self.enrollment).await?;
        info!("Payment rejected for enrollment {}", self.enrollment.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::AuthorizationDetail;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl Calls {
        fn push(&self, call: impl Into<String>) {
            self.0.lock().unwrap().push(call.into());
        }
        fn list(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    #[derive(Default)]
    struct FakeGuardian {
        calls: Calls,
    }

    #[async_trait]
    impl GuardianApi for FakeGuardian {
        async fn allow(&self, n: &Notification, _: &Enrollment) -> Bank0Result<()> {
            self.calls.push(format!("guardian.allow {}", n.transaction_token));
            Ok(())
        }
        async fn reject(&self, n: &Notification, _: &Enrollment) -> Bank0Result<()> {
            self.calls.push(format!("guardian.reject {}", n.transaction_token));
            Ok(())
        }
        async fn delete_enrollment(&self, e: &Enrollment) -> Bank0Result<()> {
            self.calls.push(format!("guardian.delete {}", e.id()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeConsent {
        calls: Calls,
        fail: bool,
        authorized: Mutex<Vec<AuthorizationDetail>>,
    }

    #[async_trait]
    impl ConsentApi for FakeConsent {
        async fn get_consent(&self, _: &Notification, _: &Enrollment) -> Bank0Result<ConsentEntity> {
            self.calls.push("consent.get");
            Ok(serde_json::from_value(json!({
                "tenant": "bank0",
                "client_id": "cli_1",
                "audience": "aud",
                "authorization_details": [{"description": "Rent", "amount": 950.0}]
            }))
            .unwrap())
        }
        async fn authorize(
            &self,
            _: &Notification,
            _: &Enrollment,
            details: &[AuthorizationDetail],
        ) -> Bank0Result<()> {
            self.calls.push("consent.authorize");
            if self.fail {
                return Err(Bank0Error::Transport("503".into()));
            }
            *self.authorized.lock().unwrap() = details.to_vec();
            Ok(())
        }
        async fn reject(&self, _: &Notification, _: &Enrollment) -> Bank0Result<()> {
            self.calls.push("consent.reject");
            if self.fail {
                return Err(Bank0Error::Transport("503".into()));
            }
            Ok(())
        }
    }

    fn enrollment(id: &str) -> Enrollment {
        Enrollment::new(id, "alice", "device", "Pixel", "push", "token")
    }

    fn notification(enrollment_id: &str, linking_id: Option<&str>) -> Notification {
        Notification {
            enrollment_id: enrollment_id.into(),
            transaction_token: "tx1".into(),
            transaction_linking_id: linking_id.map(Into::into),
            browser_name: "Firefox".into(),
            browser_version: "123".into(),
            os_name: "Linux".into(),
            os_version: "6.8".into(),
            location: None,
            date: chrono::Utc::now(),
        }
    }

    #[test]
    fn mismatch_is_refused_before_routing() {
        let err = AuthorizationRequest::route(notification("A", None), &enrollment("B")).unwrap_err();
        assert_eq!(err, Bank0Error::mismatch("A", "B"));
        let err = AuthorizationRequest::route(notification("A", Some("cns")), &enrollment("B")).unwrap_err();
        assert!(matches!(err, Bank0Error::EnrollmentMismatch { .. }));
    }

    #[test]
    fn routes_by_linking_id() {
        let login = AuthorizationRequest::route(notification("dev_1", None), &enrollment("dev_1")).unwrap();
        assert!(!login.is_payment());
        let payment =
            AuthorizationRequest::route(notification("dev_1", Some("cns_1")), &enrollment("dev_1")).unwrap();
        assert!(payment.is_payment());
        assert_eq!(payment.notification().transaction_linking_id.as_deref(), Some("cns_1"));
    }

    #[tokio::test]
    async fn login_allow_and_reject_reach_guardian() {
        let guardian = FakeGuardian::default();
        let AuthorizationRequest::Login(login) =
            AuthorizationRequest::route(notification("dev_1", None), &enrollment("dev_1")).unwrap()
        else {
            panic!("expected login");
        };
        login.allow(&guardian).await.unwrap();
        login.reject(&guardian).await.unwrap();
        assert_eq!(guardian.calls.list(), vec!["guardian.allow tx1", "guardian.reject tx1"]);
    }

    fn payment_request() -> PaymentRequest {
        match AuthorizationRequest::route(notification("dev_1", Some("cns_1")), &enrollment("dev_1")).unwrap() {
            AuthorizationRequest::Payment(p) => p,
            other => panic!("expected payment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn payment_allow_authorizes_consent_then_guardian() {
        let guardian = FakeGuardian::default();
        let consent = FakeConsent::default();
        let mut payment = payment_request();

        let details = payment.load_details(&consent).await.unwrap().unwrap();
        assert_eq!(details.description, "Rent");
        assert_eq!(details.amount, 950.0);

        payment.allow(&consent, &guardian, "ACC-7").await.unwrap();
        assert_eq!(consent.calls.list(), vec!["consent.get", "consent.authorize"]);
        assert_eq!(guardian.calls.list(), vec!["guardian.allow tx1"]);
        let sent = consent.authorized.lock().unwrap().clone();
        assert_eq!(sent[0]["source_bank_account"], "ACC-7");
    }

    #[tokio::test]
    async fn payment_allow_before_load_is_invalid_state() {
        let guardian = FakeGuardian::default();
        let consent = FakeConsent::default();
        let payment = payment_request();
        assert!(matches!(
            payment.allow(&consent, &guardian, "ACC-7").await,
            Err(Bank0Error::InvalidState(_))
        ));
        assert!(consent.calls.list().is_empty());
        assert!(guardian.calls.list().is_empty());
    }

    #[tokio::test]
    async fn consent_failure_stops_before_guardian() {
        let guardian = FakeGuardian::default();
        let consent = FakeConsent {
            fail: true,
            ..FakeConsent::default()
        };
        let mut payment = payment_request();
        payment.load_details(&consent).await.unwrap();

        assert!(matches!(
            payment.allow(&consent, &guardian, "ACC-7").await,
            Err(Bank0Error::Transport(_))
        ));
        assert!(matches!(
            payment.reject(&consent, &guardian).await,
            Err(Bank0Error::Transport(_))
        ));
        assert!(guardian.calls.list().is_empty());
    }

    #[tokio::test]
    async fn payment_reject_rejects_consent_then_guardian() {
        let guardian = FakeGuardian::default();
        let consent = FakeConsent::default();
        let payment = payment_request();
        payment.reject(&consent, &guardian).await.unwrap();
        assert_eq!(consent.calls.list(), vec!["consent.reject"]);
        assert_eq!(guardian.calls.list(), vec!["guardian.reject tx1"]);
    }
}
