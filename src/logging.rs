//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The engine's user-visible progress goes to the facade's log buffer;
//! this module wires the diagnostic `tracing` output for embedders that
//! want it. Level resolution: explicit argument, then the `QUESTLINE_LOG`
//! environment variable, then `info`.

use tracing_subscriber::EnvFilter;

/// Initialise the global subscriber.
///
/// Call once at startup; later calls return an error from the subscriber
/// registry rather than panicking.
pub fn init(level: Option<&str>) -> anyhow::Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_env("QUESTLINE_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot install tracing subscriber: {e}"))?;

    Ok(())
}
