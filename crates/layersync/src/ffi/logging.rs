//! Log forwarding to a foreign `LogCallback`
//!
//! Mobile hosts have no stderr worth reading, so records go to the host's
//! own logger (logcat, os_log). Records from dependencies (ureq, rustls,
//! rusqlite) are only forwarded at `Warn` and above; sync logs follow the
//! configured level.

use std::sync::{Arc, OnceLock, RwLock};

use log::{Level, Log, Metadata, Record, SetLoggerError};

use super::types::LogCallback;

/// Target prefix of records emitted by this crate
const OWN_TARGET: &str = "layersync";

static FFI_LOGGER: OnceLock<CallbackLogger> = OnceLock::new();

struct LoggerState {
    callback: Option<Arc<dyn LogCallback>>,
    max_level: Level,
}

struct CallbackLogger {
    state: RwLock<LoggerState>,
}

impl CallbackLogger {
    fn new(max_level: Level) -> Self {
        Self {
            state: RwLock::new(LoggerState {
                callback: None,
                max_level,
            }),
        }
    }

    fn update(&self, f: impl FnOnce(&mut LoggerState)) {
        match self.state.write() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Callback to use for a record at this level and target, if any
    fn route(&self, level: Level, target: &str) -> Option<Arc<dyn LogCallback>> {
        let state = self.state.read().ok()?;
        let limit = if target.starts_with(OWN_TARGET) {
            state.max_level
        } else {
            state.max_level.min(Level::Warn)
        };
        if level > limit {
            return None;
        }
        state.callback.clone()
    }
}

impl Log for CallbackLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.route(metadata.level(), metadata.target()).is_some()
    }

    fn log(&self, record: &Record) {
        // Clone the callback out so the foreign call runs without the lock held
        if let Some(callback) = self.route(record.level(), record.target()) {
            callback.on_log(
                record.level().into(),
                record.target().to_string(),
                record.args().to_string(),
            );
        }
    }

    fn flush(&self) {}
}

/// Install the callback logger as the global `log` backend
///
/// Records are dropped until [`set_log_callback`] provides a callback. Fails
/// if another logger (such as env_logger in the daemon) is installed.
pub fn init_ffi_logger(max_level: Level) -> Result<(), SetLoggerError> {
    let logger = FFI_LOGGER.get_or_init(|| CallbackLogger::new(max_level));
    log::set_logger(logger)?;
    log::set_max_level(max_level.to_level_filter());
    Ok(())
}

/// Replace the callback; `None` drops records again
pub fn set_log_callback(callback: Option<Arc<dyn LogCallback>>) {
    if let Some(logger) = FFI_LOGGER.get() {
        logger.update(|state| state.callback = callback);
    }
}

pub fn set_log_level(level: Level) {
    if let Some(logger) = FFI_LOGGER.get() {
        logger.update(|state| state.max_level = level);
        log::set_max_level(level.to_level_filter());
    }
}
