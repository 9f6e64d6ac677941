//! Tracing setup for the tuner.
//!
//! Command launches and filesystem mutations are logged *before* they
//! happen, so a dry run reads as the exact sequence of actions a real run
//! would take. Verbosity comes from CLI flags; `RUST_LOG` overrides both
//! when set.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Console verbosity selected by CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Command lines and warnings.
    #[default]
    Normal,
    /// Full diagnostics: shell equivalents, captured payload dumps.
    Debug,
}

impl Verbosity {
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if debug {
            Verbosity::Debug
        } else if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    fn default_filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "info",
            Verbosity::Debug => "debug",
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, falling back to the filter implied by `verbosity`.
/// Output: stderr, compact format.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_pick_the_expected_level() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        // Debug wins when both are somehow set.
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Debug);
    }
}
