//! A `log` target that reports log events to Sentry.
//!
//! The [`SentryTarget`] takes log events from the host application, turns
//! each of them into a Sentry report and hands the report to a
//! [`ReportSender`].  Events carrying an exception are reported as
//! exceptions, all other events as plain messages.  Event properties become
//! either tags or extra data.
//!
//! The target never lets a delivery failure escape into the application:
//! failures are written to a dedicated diagnostics channel and the report is
//! dropped.  Only configuration errors, such as a missing DSN or an unknown
//! level, are returned.
//!
//! # Quickstart
//!
//! ```no_run
//! use sentry_log_target::{SentryTarget, TargetConfig};
//!
//! let config = TargetConfig::builder()
//!     .dsn("https://key@sentry.example.com/42")
//!     .tag_property_names("tenant, region")
//!     .build()
//!     .unwrap();
//! SentryTarget::new(config).unwrap().install().unwrap();
//!
//! log::error!(tenant = "acme"; "invoice failed");
//! ```
//!
//! # Events
//!
//! Events are either built from `log` records, in which case the first
//! key-value pair holding an error becomes the exception, or written directly
//! with [`SentryTarget::write`]:
//!
//! ```
//! use std::sync::Arc;
//! use sentry_log_target::{
//!     levels, LogEvent, ReportPayload, SentryTarget, TargetConfig, TransportError,
//! };
//!
//! let config = TargetConfig::new("https://key@sentry.example.com/42").unwrap();
//! let sender = |payload: ReportPayload| -> Result<(), TransportError> {
//!     println!("{:?}", payload.to_event());
//!     Ok(())
//! };
//! let target = SentryTarget::with_sender(config, Arc::new(sender));
//!
//! let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
//! let event = LogEvent::new(levels::ERROR, "storage", "write failed").with_error(&err);
//! target.write(&event).unwrap();
//! ```
//!
//! # Features
//!
//! - `transport` (default): the HTTP [`HttpSender`] with native TLS.
//! - `rustls`: use rustls instead of native TLS.
//! - `test`: senders and diagnostics channels for testing.
#![warn(missing_docs)]

#[macro_use]
mod macros;

mod converters;
mod dispatch;
mod error;
mod event;
pub mod levels;
mod options;
mod target;
mod transport;

pub use crate::converters::{
    flatten_properties, partition_properties, translate, ReportContent, ReportPayload, SkipReason,
    Translation,
};
pub use crate::dispatch::{dispatch, Diagnostics, DispatchOutcome, StderrDiagnostics};
pub use crate::error::{ConfigurationError, TransportError, UnsupportedLevelError};
pub use crate::event::{ExceptionInfo, LogEvent, SourceLocation, StackFrame};
pub use crate::levels::map_level;
pub use crate::options::{IntoDsn, TagPropertyNames, TargetConfig, TargetConfigBuilder};
pub use crate::target::{SentryTarget, WriteOutcome};
#[cfg(feature = "reqwest")]
pub use crate::transport::HttpSender;
pub use crate::transport::ReportSender;

// Re-export external types for convenience
pub use sentry_types::protocol::v7::Level;
pub use sentry_types::Dsn;
