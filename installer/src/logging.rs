//! Diagnostic tracing for the installer.
//!
//! - **Tracing (this module)**: developer diagnostics via `RUST_LOG`, written
//!   to stderr. Not part of the installer's user-facing output.
//! - **Reporter (`report`)**: the stage-by-stage progress the user reads on
//!   stdout. Always printed, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=installer=debug installer install
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
