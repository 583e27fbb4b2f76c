//! Maps ordinal log levels onto Sentry levels.
//!
//! Log events carry their severity as an ordinal in the range `0..=6`, from
//! `TRACE` to `OFF`.  Sentry only knows five levels, so the mapping is lossy:
//! trace and debug both become [`Level::Debug`].  The `OFF` ordinal maps to
//! `None` which means the event must not be reported.

use sentry_types::protocol::v7::Level;

use crate::error::UnsupportedLevelError;

/// Ordinal of trace messages.
pub const TRACE: usize = 0;
/// Ordinal of debug messages.
pub const DEBUG: usize = 1;
/// Ordinal of informational messages.
pub const INFO: usize = 2;
/// Ordinal of warnings.
pub const WARN: usize = 3;
/// Ordinal of errors.
pub const ERROR: usize = 4;
/// Ordinal of fatal errors.
pub const FATAL: usize = 5;
/// Ordinal that disables reporting.
pub const OFF: usize = 6;

/// Converts a level ordinal to a Sentry [`Level`].
///
/// Returns `Ok(None)` for [`OFF`].  Ordinals outside of `0..=6` are rejected
/// with an [`UnsupportedLevelError`].
///
/// # Examples
///
/// ```
/// use sentry_log_target::{levels, map_level, Level};
///
/// assert_eq!(map_level(levels::TRACE).unwrap(), Some(Level::Debug));
/// assert_eq!(map_level(levels::OFF).unwrap(), None);
/// assert!(map_level(42).is_err());
/// ```
pub fn map_level(ordinal: usize) -> Result<Option<Level>, UnsupportedLevelError> {
    Ok(Some(match ordinal {
        TRACE | DEBUG => Level::Debug,
        INFO => Level::Info,
        WARN => Level::Warning,
        ERROR => Level::Error,
        FATAL => Level::Fatal,
        OFF => return Ok(None),
        ordinal => return Err(UnsupportedLevelError { ordinal }),
    }))
}

/// Returns the ordinal for a [`log::Level`].
///
/// The `log` crate has no fatal level, so [`FATAL`] is never produced.
pub fn ordinal_from_log_level(level: log::Level) -> usize {
    match level {
        log::Level::Trace => TRACE,
        log::Level::Debug => DEBUG,
        log::Level::Info => INFO,
        log::Level::Warn => WARN,
        log::Level::Error => ERROR,
    }
}
