//! Logging setup for binaries and tests

use seqline_core::SeqlineResult;

use crate::config::LoggingConfig;

/// Install a global fmt subscriber configured by `config`.
///
/// Returns `Ok(false)` when a global subscriber was already installed, which
/// makes the call safe to repeat from every test.
pub fn init_logging(config: &LoggingConfig) -> SeqlineResult<bool> {
    let level = config.max_level()?;

    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_ansi(config.ansi)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    Ok(installed)
}
