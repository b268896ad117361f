//! Logging initialization for the CLI entry point.
//!
//! Output is human readable by default; set `PORTIERE_LOG_FORMAT=json` for
//! one JSON object per line, which is what log collectors expect.

use anyhow::Result;
use std::env::var;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a filter directive fails to parse or the subscriber
/// is already set.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let verbosity_level = verbosity_level.unwrap_or(Level::ERROR);

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?);

    let json_output = var("PORTIERE_LOG_FORMAT").is_ok_and(|format| format == "json");

    if json_output {
        let fmt_layer = fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_target(false)
            .json();
        let subscriber = Registry::default().with(fmt_layer).with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let fmt_layer = fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_target(false)
            .pretty();
        let subscriber = Registry::default().with(fmt_layer).with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
