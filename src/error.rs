use std::time::Duration;

use sentry_types::ParseDsnError;
use thiserror::Error;

/// Raised when a severity ordinal has no Sentry counterpart.
///
/// This means the level set of the host logging framework has diverged from
/// the mapping table in [`map_level`](crate::map_level).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unsupported log level ordinal {ordinal}")]
pub struct UnsupportedLevelError {
    /// The offending ordinal.
    pub ordinal: usize,
}

/// A misconfiguration of the target.
///
/// These are the only errors that leave the target.  They are raised either
/// when the configuration is built or by the offending `write` call.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No DSN was configured.
    #[error("no dsn configured")]
    MissingDsn,
    /// The DSN could not be parsed.
    #[error("invalid dsn: {0}")]
    InvalidDsn(#[from] ParseDsnError),
    /// The event carried a level the target does not know about.
    #[error(transparent)]
    UnsupportedLevel(#[from] UnsupportedLevelError),
    /// The default report sender could not be created.
    #[error("failed to set up report sender: {0}")]
    SenderSetup(#[source] TransportError),
}

/// A failure to deliver a report.
///
/// Transport errors never leave the target; they are reported on the
/// diagnostics channel and the report is dropped.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be performed.
    #[error("failed to send report: {0}")]
    Http(String),
    /// The server answered with a non-success status.
    #[error("report rejected with status {status}")]
    Rejected {
        /// The HTTP status code.
        status: u16,
    },
    /// The sender is rate limited for the given duration.
    #[error("rate limited for {0:?}")]
    RateLimited(Duration),
    /// The report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Any other sender specific failure.
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => TransportError::Rejected {
                status: status.as_u16(),
            },
            None => TransportError::Http(err.to_string()),
        }
    }
}

#[test]
fn test_error_messages() {
    let err = ConfigurationError::from(UnsupportedLevelError { ordinal: 7 });
    assert_eq!(err.to_string(), "unsupported log level ordinal 7");

    let err = TransportError::Rejected { status: 403 };
    assert_eq!(err.to_string(), "report rejected with status 403");

    assert_eq!(ConfigurationError::MissingDsn.to_string(), "no dsn configured");
}
