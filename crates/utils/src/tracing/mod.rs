//! Tracing subscriber initialisation

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn, Level};

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing system
///
/// Installs a compact stderr formatter filtered by `RUST_LOG` (falling back to
/// [`DEFAULT_FILTER`]). Per-component verbosity is selected by target, e.g.
/// `RUST_LOG=memoria_cache=debug`. Fails if a global subscriber is already set.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    init_with_filter(None)
}

/// Initialize the tracing system with an explicit filter directive
///
/// `None` behaves like [`init`].
pub fn init_with_filter(
    directive: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)?,
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}
