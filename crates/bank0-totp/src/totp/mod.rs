//! Code engine: sub-modules.

pub mod types;
pub mod core;
pub mod schedule;
pub mod clock;
pub mod ticker;

// Re-export top-level items for convenience.
pub use types::*;
pub use self::core::{format_code_display, generate, TotpGenerator};
pub use clock::{Clock, MonotonicClock, SystemClock};
pub use schedule::{is_near_expiry, schedule_next_boundary};
pub use ticker::CodeTicker;
