//! Tracing subscriber setup for the `gitsem` binary.
//!
//! `RUST_LOG` wins when set. Otherwise the configured `logging.level` is used,
//! and `--debug` raises it to `debug`. Output goes to stderr so JSON written
//! to stdout stays machine-readable.

use crate::config::Settings;
use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is absent.
pub fn default_directive(settings: &Settings, debug: bool) -> String {
    if debug || settings.debug {
        "debug".to_string()
    } else {
        settings.logging.level.to_lowercase()
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(settings: &Settings, debug: bool) {
    let directive = default_directive(settings, debug);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_overrides_level() {
        let settings = Settings::default();
        assert_eq!(default_directive(&settings, false), "warn");
        assert_eq!(default_directive(&settings, true), "debug");

        let mut settings = Settings::default();
        settings.logging.level = "INFO".to_string();
        assert_eq!(default_directive(&settings, false), "info");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        let settings = Settings::default();
        init(&settings, false);
        init(&settings, true);
    }
}
