//!
//! Log file setup shared by every binary.
//!

use std::sync::Arc;

use crate::Result;

/// Install the global subscriber, appending to `{base}.log`.
///
/// `RUST_LOG` narrows the output; the default level is `info`.
pub fn init(base: &str) -> Result<()> {
    let path = format!("{}.log", base);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
