//! Process-level setup for hosts embedding the audit engine.

use std::sync::Once;

static LOGGING: Once = Once::new();

/// Initialize logging with tracing_subscriber.
///
/// `RUST_LOG` overrides the default `info` level. Safe to call more than
/// once, and a no-op if the host already installed a global subscriber.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("headless_chrome=warn".parse().unwrap());

        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .with_ansi(true)
            .try_init();

        if installed.is_err() {
            tracing::debug!("[LIFECYCLE] Global subscriber already set, keeping it");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging();
        init_logging();
        tracing::info!("[LIFECYCLE] still logging");
    }
}
