//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Map the verbose flag onto a default filter

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "composition_harness=info,tower_http=debug"
    } else {
        "composition_harness=warn"
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose).into());

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    if installed.is_ok() {
        tracing::debug!(verbose, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_default_level() {
        assert!(default_filter(true).starts_with("composition_harness=info"));
        assert_eq!(default_filter(false), "composition_harness=warn");
    }

    #[test]
    fn repeated_init_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
