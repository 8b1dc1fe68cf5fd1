//! Log subscriber installation for the binary.

use std::io;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LoggingError {
    /// Another global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Default filter directive for the given verbosity.
#[must_use]
pub const fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Builds the filter, preferring `RUST_LOG` when it is set and valid.
#[must_use]
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Installs a formatting subscriber that writes to stderr and includes the
/// worker thread name on every line.
///
/// # Errors
///
/// Returns [`LoggingError::Install`] when a global subscriber already exists.
pub fn init_tracing(verbose: bool) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_thread_names(true)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|err| LoggingError::Install(err.to_string()))
}
