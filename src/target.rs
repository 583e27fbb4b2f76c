use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use log::LevelFilter;

use crate::converters::{translate, SkipReason, Translation};
use crate::dispatch::{dispatch, Diagnostics, DispatchOutcome, StderrDiagnostics, DIAGNOSTICS_PREFIX};
use crate::error::ConfigurationError;
use crate::event::LogEvent;
use crate::options::TargetConfig;
use crate::transport::ReportSender;

/// Log targets of the crates that carry reports to Sentry.
///
/// Their records are never reported, as reporting them would produce more of
/// them.
const TRANSPORT_TARGETS: &[&str] = &["reqwest", "hyper", "hyper_util", "h2", "rustls", "native_tls"];

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as busy writing a report.
struct DispatchGuard {
    previous: bool,
}

impl DispatchGuard {
    fn enter() -> DispatchGuard {
        DispatchGuard {
            previous: DISPATCHING.with(|d| d.replace(true)),
        }
    }

    fn is_active() -> bool {
        DISPATCHING.with(Cell::get)
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|d| d.set(self.previous));
    }
}

/// What happened to a written event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The event was not reported.
    Skipped(SkipReason),
    /// The report was handed to the sender successfully.
    Sent,
    /// The sender failed; the failure went to the diagnostics channel.
    SendFailed,
}

type Renderer = Box<dyn Fn(&LogEvent) -> String + Send + Sync>;

/// Reports log events to Sentry.
///
/// Events are written with [`write`](Self::write), or through the
/// [`log::Log`] implementation once the target is installed as the global
/// logger.  The target translates each event into a report and hands it to
/// its [`ReportSender`].  Delivery failures never reach the caller.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use sentry_log_target::{
///     levels, LogEvent, ReportPayload, SentryTarget, TargetConfig, TransportError, WriteOutcome,
/// };
///
/// let config = TargetConfig::builder()
///     .dsn("https://public@sentry.example.com/42")
///     .tag_property_names("tenant")
///     .build()
///     .unwrap();
/// let sender = |payload: ReportPayload| -> Result<(), TransportError> {
///     assert_eq!(payload.tags["tenant"], "acme");
///     Ok(())
/// };
/// let target = SentryTarget::with_sender(config, Arc::new(sender));
///
/// let event = LogEvent::new(levels::ERROR, "billing", "invoice failed")
///     .with_property("tenant", "acme");
/// assert_eq!(target.write(&event).unwrap(), WriteOutcome::Sent);
/// ```
pub struct SentryTarget {
    config: TargetConfig,
    sender: Arc<dyn ReportSender>,
    renderer: Renderer,
    diagnostics: Arc<dyn Diagnostics>,
    filter: LevelFilter,
    global_filter: Option<LevelFilter>,
    ignored_targets: Vec<Cow<'static, str>>,
    dest_log: Option<Box<dyn log::Log>>,
}

impl SentryTarget {
    /// Creates a target that sends reports over HTTP to the configured DSN.
    #[cfg(feature = "reqwest")]
    pub fn new(config: TargetConfig) -> Result<SentryTarget, ConfigurationError> {
        let sender =
            crate::transport::HttpSender::new(&config).map_err(ConfigurationError::SenderSetup)?;
        Ok(SentryTarget::with_sender(config, Arc::new(sender)))
    }

    /// Creates a target that hands reports to the given sender.
    pub fn with_sender(config: TargetConfig, sender: Arc<dyn ReportSender>) -> SentryTarget {
        SentryTarget {
            config,
            sender,
            renderer: Box::new(|event| event.message.clone()),
            diagnostics: Arc::new(StderrDiagnostics),
            filter: LevelFilter::Trace,
            global_filter: None,
            ignored_targets: TRANSPORT_TARGETS.iter().map(|t| Cow::Borrowed(*t)).collect(),
            dest_log: None,
        }
    }

    /// Sets the function that renders the message of an event.
    ///
    /// By default the message of the event is used verbatim.
    pub fn renderer<R>(mut self, renderer: R) -> Self
    where
        R: Fn(&LogEvent) -> String + Send + Sync + 'static,
    {
        self.renderer = Box::new(renderer);
        self
    }

    /// Sets the channel for internal diagnostics (defaults to stderr).
    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Sets the most verbose `log` level that is reported (defaults to
    /// `Trace`).
    pub fn filter(mut self, filter: LevelFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the global filter used when the target is installed.
    ///
    /// This is also applied before dispatching to the destination logger.
    pub fn global_filter(mut self, filter: LevelFilter) -> Self {
        self.global_filter = Some(filter);
        self
    }

    /// Never reports records whose `log` target is `prefix` or lives below it.
    pub fn ignore_target<T: Into<Cow<'static, str>>>(mut self, prefix: T) -> Self {
        self.ignored_targets.push(prefix.into());
        self
    }

    /// Forwards every record to another logger as well.
    pub fn dest_log(mut self, dest_log: Box<dyn log::Log>) -> Self {
        self.dest_log = Some(dest_log);
        self
    }

    /// Returns the configuration of the target.
    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Writes a single event.
    ///
    /// Only configuration errors are returned; a failed delivery results in
    /// [`WriteOutcome::SendFailed`].
    pub fn write(&self, event: &LogEvent) -> Result<WriteOutcome, ConfigurationError> {
        let _guard = DispatchGuard::enter();

        let rendered = (self.renderer)(event);
        let payload = match translate(event, &self.config, &rendered)? {
            Translation::Report(payload) => payload,
            Translation::Skip(reason) => {
                target_debug!(
                    self,
                    "Skipping event from `{}`: {:?}",
                    event.logger_name,
                    reason
                );
                return Ok(WriteOutcome::Skipped(reason));
            }
        };

        target_debug!(
            self,
            "Sending {:?} report from `{}`",
            payload.severity,
            payload.logger_name
        );
        Ok(match dispatch(payload, &*self.sender, &*self.diagnostics) {
            DispatchOutcome::Sent => WriteOutcome::Sent,
            DispatchOutcome::SendFailed => WriteOutcome::SendFailed,
        })
    }

    /// Returns the effective global filter.
    ///
    /// This is the greater of `global_filter` and `filter`.
    pub(crate) fn effective_global_filter(&self) -> LevelFilter {
        match self.global_filter {
            Some(filter) => std::cmp::max(filter, self.filter),
            None => self.filter,
        }
    }

    fn is_ignored_target(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|prefix| {
            target
                .strip_prefix(prefix.as_ref())
                .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
        })
    }

    fn should_report(&self, record: &log::Record<'_>) -> bool {
        record.level() <= self.filter
            && !self.is_ignored_target(record.target())
            && !DispatchGuard::is_active()
    }

    /// Installs the target as the global logger.
    ///
    /// The maximum log level is raised to the effective global filter.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let filter = self.effective_global_filter();
        log::set_boxed_logger(Box::new(self)).map(|()| {
            if filter > log::max_level() {
                log::set_max_level(filter);
            }
        })
    }
}

impl fmt::Debug for SentryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct DestLog;
        let dest_log = self.dest_log.as_ref().map(|_| DestLog);

        f.debug_struct("SentryTarget")
            .field("config", &self.config)
            .field("filter", &self.filter)
            .field("global_filter", &self.global_filter)
            .field("ignored_targets", &self.ignored_targets)
            .field("dest_log", &dest_log)
            .finish()
    }
}

impl log::Log for SentryTarget {
    fn enabled(&self, md: &log::Metadata<'_>) -> bool {
        if let Some(global_filter) = self.global_filter {
            if md.level() > global_filter {
                return false;
            }
        }
        md.level() <= self.filter || self.dest_log.as_ref().map_or(false, |x| x.enabled(md))
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.should_report(record) {
            if let Err(err) = self.write(&LogEvent::from_record(record)) {
                self.diagnostics
                    .emit(&format!("{} {}", DIAGNOSTICS_PREFIX, err));
            }
        }
        if let Some(ref log) = self.dest_log {
            if log.enabled(record.metadata()) {
                log.log(record);
            }
        }
    }

    fn flush(&self) {
        if let Some(ref log) = self.dest_log {
            log.flush();
        }
    }
}
