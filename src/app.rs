//! # Application Controller
//!
//! [`Bank0App`] owns the configuration, the enrollment store, the code ticker
//! and the enrollment currently held. It is the only place where the held
//! enrollment changes; network calls run against copies and their outcome is
//! applied here once they return.

use std::sync::Arc;

use bank0_core::{Bank0Error, Bank0Result, Enrollment};
use bank0_guardian::{AuthorizationRequest, GuardianApi, Notification};
use bank0_storage::{EnrollmentStore, EnrollmentStoreState};
use bank0_totp::totp::{self, Clock, CodeTicker, CodeUpdate, GeneratedCode, SystemClock};
use log::{info, warn};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::AppConfig;

pub struct Bank0App {
    config: AppConfig,
    store: EnrollmentStoreState,
    clock: Arc<dyn Clock>,
    ticker: CodeTicker,
    enrollment: Option<Enrollment>,
}

impl Bank0App {
    /// Build a controller and the receiving end of its code updates.
    pub fn new(
        config: AppConfig,
        store: EnrollmentStoreState,
        clock: Arc<dyn Clock>,
    ) -> (Self, UnboundedReceiver<CodeUpdate>) {
        let (ticker, updates) = CodeTicker::channel(config.code, clock.clone());
        let app = Self {
            config,
            store,
            clock,
            ticker,
            enrollment: None,
        };
        (app, updates)
    }

    /// Controller over the configured preference file and the system clock.
    pub fn open(config: AppConfig) -> Bank0Result<(Self, UnboundedReceiver<CodeUpdate>)> {
        let path = config.resolved_store_path()?;
        info!("Using enrollment store {}", path.display());
        let store = EnrollmentStore::open(path).shared();
        Ok(Self::new(config, store, Arc::new(SystemClock)))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &EnrollmentStoreState {
        &self.store
    }

    /// The enrollment currently held, if any.
    pub fn enrollment(&self) -> Option<&Enrollment> {
        self.enrollment.as_ref()
    }

    /// Load the stored enrollment without starting the ticker.
    pub fn load(&mut self) -> Bank0Result<Option<&Enrollment>> {
        self.enrollment = self.store.load()?;
        match &self.enrollment {
            Some(enrollment) => info!("Loaded enrollment {}", enrollment.id()),
            None => info!("No enrollment on this device"),
        }
        Ok(self.enrollment.as_ref())
    }

    /// Load the stored enrollment and, when it supports codes, start the
    /// ticker. Returns the first code published.
    pub fn start(&mut self) -> Bank0Result<Option<GeneratedCode>> {
        self.load()?;
        self.rebind()
    }

    /// Persist a freshly issued enrollment and switch the display to it.
    ///
    /// The enrollment is stored and held even if its code parameters turn out
    /// to be unusable or incomplete; that error is returned and no code is
    /// shown. Only an enrollment without any code parameter yields `Ok(None)`.
    pub fn complete_enrollment(
        &mut self,
        enrollment: Enrollment,
    ) -> Bank0Result<Option<GeneratedCode>> {
        self.store.save(&enrollment)?;
        info!("Enrollment {} completed", enrollment.id());
        self.enrollment = Some(enrollment);
        self.rebind()
    }

    /// Remove the enrollment on the service side, then locally.
    ///
    /// If the service no longer knows the enrollment the local copy is
    /// removed anyway. Any other failure leaves everything as it was.
    pub async fn unenroll(&mut self, guardian: &dyn GuardianApi) -> Bank0Result<()> {
        let enrollment = self.enrollment.clone().ok_or(Bank0Error::NotEnrolled)?;
        match guardian.delete_enrollment(&enrollment).await {
            Ok(()) => info!("Enrollment {} deleted", enrollment.id()),
            Err(Bank0Error::EnrollmentNotFound(_)) => {
                warn!(
                    "Enrollment {} was already gone on the service; removing locally",
                    enrollment.id()
                );
            }
            Err(e) => return Err(e),
        }
        self.forget()
    }

    /// Drop the local enrollment without contacting the service.
    pub fn forget(&mut self) -> Bank0Result<()> {
        self.ticker.cancel();
        self.store.clear()?;
        self.enrollment = None;
        Ok(())
    }

    /// Stop publishing codes, e.g. when the display goes away.
    pub fn detach(&self) {
        self.ticker.cancel();
    }

    /// Code of the held enrollment right now, without touching the ticker.
    pub fn current_code(&self) -> Bank0Result<GeneratedCode> {
        let enrollment = self.enrollment.as_ref().ok_or(Bank0Error::NotEnrolled)?;
        totp::generate(enrollment, self.clock.now_millis())
    }

    /// Match a notification to the held enrollment and pick its flow.
    pub fn route_notification(
        &self,
        notification: Notification,
    ) -> Bank0Result<AuthorizationRequest> {
        let enrollment = self.enrollment.as_ref().ok_or(Bank0Error::NotEnrolled)?;
        AuthorizationRequest::route(notification, enrollment)
    }

    fn rebind(&self) -> Bank0Result<Option<GeneratedCode>> {
        match &self.enrollment {
            // Any code parameter present means codes are expected; a missing
            // one surfaces as an error from the ticker.
            Some(enrollment) if enrollment.has_totp_parameters() => {
                self.ticker.bind(enrollment).map(Some).map_err(|e| {
                    warn!("No codes for enrollment {}: {}", enrollment.id(), e);
                    e
                })
            }
            _ => {
                self.ticker.cancel();
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for Bank0App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bank0App")
            .field("config", &self.config)
            .field("ticker", &self.ticker)
            .field("enrolled", &self.enrollment.is_some())
            .finish()
    }
}
