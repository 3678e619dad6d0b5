//! Boundary-aligned code refresh.
//!
//! A [`CodeTicker`] owns at most one background task. Binding an enrollment
//! publishes the current code immediately, then the task sleeps until either
//! the warning instant of the current window or just past its boundary,
//! whichever comes first, and publishes what changed.
//!
//! Every bind or cancel bumps the publisher generation while holding its
//! lock, so a task that wakes after being superseded publishes nothing even
//! if its abort has not landed yet.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bank0_core::{Bank0Error, Bank0Result, Enrollment};
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::totp::clock::Clock;
use crate::totp::core::TotpGenerator;
use crate::totp::schedule;
use crate::totp::types::*;

struct Publisher {
    generation: u64,
    tx: UnboundedSender<CodeUpdate>,
    /// Counter of the last window a code was published for.
    last_counter: Option<u64>,
    /// Whether the expiry signal for `last_counter` has gone out.
    warned: bool,
}

impl Publisher {
    /// Publish for a freshly computed code. Returns `false` once the display
    /// side has hung up.
    fn offer(&mut self, code: GeneratedCode, near_expiry: bool) -> bool {
        let urgency = match self.last_counter {
            Some(last) if code.counter < last => return true,
            Some(last) if code.counter == last => {
                if self.warned || !near_expiry {
                    return true;
                }
                Urgency::AboutToExpire
            }
            _ if near_expiry => Urgency::AboutToExpire,
            _ => Urgency::Normal,
        };
        self.last_counter = Some(code.counter);
        self.warned = urgency == Urgency::AboutToExpire;
        self.tx.send(CodeUpdate { code, urgency }).is_ok()
    }
}

/// Cancellable publisher of the current code of one enrollment.
pub struct CodeTicker {
    settings: TickerSettings,
    clock: Arc<dyn Clock>,
    publisher: Arc<Mutex<Publisher>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CodeTicker {
    /// Create a ticker publishing into `tx`.
    pub fn new(
        settings: TickerSettings,
        clock: Arc<dyn Clock>,
        tx: UnboundedSender<CodeUpdate>,
    ) -> Self {
        Self {
            settings,
            clock,
            publisher: Arc::new(Mutex::new(Publisher {
                generation: 0,
                tx,
                last_counter: None,
                warned: false,
            })),
            task: Mutex::new(None),
        }
    }

    /// Create a ticker together with the receiving end of its updates.
    pub fn channel(
        settings: TickerSettings,
        clock: Arc<dyn Clock>,
    ) -> (Self, UnboundedReceiver<CodeUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(settings, clock, tx), rx)
    }

    pub fn settings(&self) -> TickerSettings {
        self.settings
    }

    /// Start publishing codes for `enrollment`, replacing any previous binding.
    ///
    /// The first code is published before this returns. On error the ticker
    /// is left unbound.
    pub fn bind(&self, enrollment: &Enrollment) -> Bank0Result<GeneratedCode> {
        let generation = self.cancel();

        let generator = TotpGenerator::from_enrollment(enrollment)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Bank0Error::InvalidState("code ticker needs a tokio runtime".into()))?;

        let now = self.clock.now_millis();
        let first = generator.generate_at(now);
        {
            let mut publisher = lock(&self.publisher);
            if publisher.generation != generation {
                return Err(Bank0Error::InvalidState(
                    "ticker was re-bound concurrently".into(),
                ));
            }
            publisher.last_counter = None;
            publisher.warned = false;
            let near = schedule::is_near_expiry(now, generator.period(), self.settings.warn_window_ms);
            if !publisher.offer(first.clone(), near) {
                debug!("Code display is gone; not starting ticker");
                return Ok(first);
            }
        }

        let handle = runtime.spawn(run(
            generator,
            self.settings,
            self.clock.clone(),
            self.publisher.clone(),
            generation,
        ));
        *lock(&self.task) = Some(handle);
        info!("Code ticker bound to enrollment {}", enrollment.id());
        Ok(first)
    }

    /// Stop publishing. Returns the new generation.
    pub fn cancel(&self) -> u64 {
        let generation = {
            let mut publisher = lock(&self.publisher);
            publisher.generation += 1;
            publisher.generation
        };
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
            debug!("Code ticker cancelled (generation {})", generation);
        }
        generation
    }

    /// `true` while a refresh task is alive.
    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for CodeTicker {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for CodeTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeTicker")
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .finish()
    }
}

// A poisoned lock only means a panic elsewhere mid-publish; the state is
// still a consistent value.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run(
    generator: TotpGenerator,
    settings: TickerSettings,
    clock: Arc<dyn Clock>,
    publisher: Arc<Mutex<Publisher>>,
    generation: u64,
) {
    let period = generator.period();
    loop {
        let now = clock.now_millis();
        let warned = lock(&publisher).warned;
        let warning = if warned {
            None
        } else {
            schedule::delay_until_warning(now, period, settings.warn_window_ms)
        };
        let delay = warning
            .unwrap_or_else(|| schedule::schedule_next_boundary(now, period, settings.boundary_skew_ms));
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let now = clock.now_millis();
        let code = generator.generate_at(now);
        let near = schedule::is_near_expiry(now, period, settings.warn_window_ms);

        let mut state = lock(&publisher);
        if state.generation != generation {
            return;
        }
        if !state.offer(code, near) {
            warn!(
                "Code display for enrollment {} went away; stopping ticker",
                generator.enrollment_id()
            );
            return;
        }
    }
}
