//! Process-wide logging bootstrap.
//!
//! Diagnostics go to stderr through flexi_logger. `RUST_LOG` wins over the
//! configured level when set. Initialization is idempotent for the same level
//! and refuses to switch to a different one afterwards.

use flexi_logger::{Logger, LoggerHandle};
use log::debug;
use once_cell::sync::OnceCell;

use crate::error::{HostError, Result};

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    _logger: LoggerHandle,
}

pub fn init_logging(level: &str) -> Result<()> {
    let normalized = normalize_level(level)?;

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState> {
        let logger = Logger::try_with_env_or_str(normalized)?
            .log_to_stderr()
            .format(flexi_logger::default_format)
            .start()?;
        debug!(
            "event=logging_init level={} platform={} version={}",
            normalized,
            std::env::consts::OS,
            env!("CARGO_PKG_VERSION")
        );
        Ok(LoggingState {
            level: normalized,
            _logger: logger,
        })
    })?;

    if state.level != normalized {
        return Err(HostError::Logging(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, normalized
        )));
    }
    Ok(())
}

/// The level logging was started with, if it was started.
pub fn logging_level() -> Option<&'static str> {
    LOGGING_STATE.get().map(|state| state.level)
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        other => Err(HostError::Logging(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        ))),
    }
}
