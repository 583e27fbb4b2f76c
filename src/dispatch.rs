//! Failure containment around report senders.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::converters::ReportPayload;
use crate::transport::ReportSender;

/// The prefix of every diagnostic line.
pub const DIAGNOSTICS_PREFIX: &str = "[sentry-log-target]";

/// A channel for internal diagnostics.
///
/// The target is a logger itself, so it cannot report its own problems
/// through the `log` facade without recursing into itself.  Diagnostics go to
/// this channel instead.
///
/// Any `Fn(&str)` closure is a diagnostics channel too.
pub trait Diagnostics: Send + Sync + 'static {
    /// Emits a single diagnostic line.
    fn emit(&self, line: &str);
}

impl<F> Diagnostics for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn emit(&self, line: &str) {
        self(line)
    }
}

/// Writes diagnostics to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrDiagnostics;

impl Diagnostics for StderrDiagnostics {
    fn emit(&self, line: &str) {
        eprintln!("{}", line);
    }
}

/// The result of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The sender accepted the report.
    Sent,
    /// The sender failed; the failure was reported on the diagnostics
    /// channel and the report was dropped.
    SendFailed,
}

fn message_from_panic(payload: &(dyn Any + Send)) -> &str {
    match payload.downcast_ref::<&'static str>() {
        Some(s) => s,
        None => match payload.downcast_ref::<String>() {
            Some(s) => &s[..],
            None => "Box<Any>",
        },
    }
}

/// Hands a report to a sender without ever failing.
///
/// Errors returned by the sender, and panics inside of it, are turned into a
/// single diagnostic line.  The report is not retried.
pub fn dispatch(
    payload: ReportPayload,
    sender: &dyn ReportSender,
    diagnostics: &dyn Diagnostics,
) -> DispatchOutcome {
    match catch_unwind(AssertUnwindSafe(|| sender.send(payload))) {
        Ok(Ok(())) => DispatchOutcome::Sent,
        Ok(Err(err)) => {
            diagnostics.emit(&format!(
                "{} Failed to send report: {}",
                DIAGNOSTICS_PREFIX, err
            ));
            DispatchOutcome::SendFailed
        }
        Err(panic) => {
            diagnostics.emit(&format!(
                "{} Report sender panicked: {}",
                DIAGNOSTICS_PREFIX,
                message_from_panic(&*panic)
            ));
            DispatchOutcome::SendFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::ReportContent;
    use crate::error::TransportError;
    use crate::test::{CapturedDiagnostics, TestSender};
    use sentry_types::protocol::v7::Level;

    fn payload() -> ReportPayload {
        ReportPayload {
            severity: Level::Error,
            logger_name: "app".into(),
            content: ReportContent::Message("hello".into()),
            tags: Default::default(),
            extra: Default::default(),
        }
    }

    #[test]
    fn test_sent() {
        let sender = TestSender::new();
        let diagnostics = CapturedDiagnostics::new();
        assert_eq!(
            dispatch(payload(), &*sender, &*diagnostics),
            DispatchOutcome::Sent
        );
        assert_eq!(sender.fetch_and_clear_payloads(), vec![payload()]);
        assert!(diagnostics.lines().is_empty());
    }

    #[test]
    fn test_send_failed() {
        let sender = |_: ReportPayload| -> Result<(), TransportError> {
            Err(TransportError::Http("connection refused".into()))
        };
        let diagnostics = CapturedDiagnostics::new();
        assert_eq!(
            dispatch(payload(), &sender, &*diagnostics),
            DispatchOutcome::SendFailed
        );
        assert_eq!(
            diagnostics.lines(),
            vec!["[sentry-log-target] Failed to send report: failed to send report: connection refused"]
        );
    }

    #[test]
    fn test_sender_panics() {
        let sender = |_: ReportPayload| -> Result<(), TransportError> { panic!("boom") };
        let diagnostics = CapturedDiagnostics::new();
        assert_eq!(
            dispatch(payload(), &sender, &*diagnostics),
            DispatchOutcome::SendFailed
        );
        let lines = diagnostics.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Report sender panicked: boom"));
    }
}
