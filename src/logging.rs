//! Process-wide log subscriber.
//!
//! Library crates log through the `log` facade; the subscriber's
//! `tracing-log` bridge picks those records up alongside native `tracing`
//! events. Output goes to stderr so stdout stays free for command output.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` takes precedence over
/// `default_filter`. Calling this twice keeps the first subscriber.
pub fn init(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    #[cfg(feature = "logs-json")]
    let result = builder.json().try_init();
    #[cfg(not(feature = "logs-json"))]
    let result = builder.try_init();

    if let Err(e) = result {
        tracing::debug!("log subscriber already installed: {}", e);
    }
}
