use crate::converters::ReportPayload;
use crate::error::TransportError;

#[cfg(feature = "reqwest")]
pub use self::http::HttpSender;

/// The trait for report senders.
///
/// A sender delivers a single report.  Errors are returned to the caller
/// which reports them on its diagnostics channel; senders must not retry on
/// their own.  Senders are shared between threads.
///
/// Any `Fn(ReportPayload) -> Result<(), TransportError>` closure is a sender
/// too.
pub trait ReportSender: Send + Sync + 'static {
    /// Sends a report.
    fn send(&self, payload: ReportPayload) -> Result<(), TransportError>;
}

impl<F> ReportSender for F
where
    F: Fn(ReportPayload) -> Result<(), TransportError> + Send + Sync + 'static,
{
    fn send(&self, payload: ReportPayload) -> Result<(), TransportError> {
        self(payload)
    }
}

#[cfg(feature = "reqwest")]
mod http {
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    use httpdate::parse_http_date;
    use reqwest::blocking::Client;
    use reqwest::header::RETRY_AFTER;
    use reqwest::StatusCode;
    use sentry_types::protocol::v7::Envelope;

    use super::ReportSender;
    use crate::converters::ReportPayload;
    use crate::error::TransportError;
    use crate::options::TargetConfig;

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Remembers until when the server asked us to back off.
    #[derive(Debug, Default)]
    pub(crate) struct RateLimiter {
        disabled_until: Option<SystemTime>,
    }

    /// Returns the point in time `seconds` from now, if representable.
    fn seconds_from_now(seconds: f64) -> Option<SystemTime> {
        SystemTime::now().checked_add(Duration::from_secs(seconds.ceil() as u64))
    }

    impl RateLimiter {
        /// Updates the limiter from a `Retry-After` header.
        pub(crate) fn update_from_retry_after(&mut self, header: &str) {
            let new_time = if let Ok(value) = header.parse::<f64>() {
                seconds_from_now(value)
            } else if let Ok(value) = parse_http_date(header) {
                Some(value)
            } else {
                None
            };

            if new_time.is_some() {
                self.disabled_until = new_time;
            }
        }

        /// Updates the limiter from a `X-Sentry-Rate-Limits` header.
        ///
        /// Only limits that apply to all categories or to errors matter for
        /// this sender.
        pub(crate) fn update_from_sentry_header(&mut self, header: &str) {
            // <rate-limit> = (<group>,)+
            // <group> = <time>:(<category>;)+:<scope>(:<reason>)?
            for group in header.split(',') {
                let mut splits = group.trim().split(':');
                let seconds = match splits.next().and_then(|s| s.parse::<f64>().ok()) {
                    Some(seconds) => seconds,
                    None => continue,
                };
                let categories = splits.next().unwrap_or("");
                if categories.is_empty() || categories.split(';').any(|c| c == "error") {
                    let new_time = match seconds_from_now(seconds) {
                        Some(new_time) => new_time,
                        None => continue,
                    };
                    if self.disabled_until.map_or(true, |until| until < new_time) {
                        self.disabled_until = Some(new_time);
                    }
                }
            }
        }

        /// Applies the default back off after a bare 429 response.
        pub(crate) fn update_from_429(&mut self) {
            self.disabled_until = Some(SystemTime::now() + Duration::from_secs(60));
        }

        /// Returns how long sending is still disabled.
        pub(crate) fn is_disabled(&self) -> Option<Duration> {
            self.disabled_until
                .and_then(|until| until.duration_since(SystemTime::now()).ok())
        }
    }

    /// A [`ReportSender`] that posts reports to Sentry via [`reqwest`].
    ///
    /// Requests are performed synchronously on the calling thread.  When the
    /// server rate limits the client, reports are rejected locally with
    /// [`TransportError::RateLimited`] until the limit expires.
    ///
    /// [`reqwest`]: https://crates.io/crates/reqwest
    pub struct HttpSender {
        client: Client,
        url: String,
        auth: String,
        limiter: Mutex<RateLimiter>,
    }

    impl HttpSender {
        /// Creates a sender for the DSN of the given configuration.
        pub fn new(config: &TargetConfig) -> Result<HttpSender, TransportError> {
            let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
            Ok(HttpSender::with_client(config, client))
        }

        /// Creates a sender that uses the specified [`Client`].
        pub fn with_client(config: &TargetConfig, client: Client) -> HttpSender {
            let dsn = config.dsn();
            HttpSender {
                client,
                url: dsn.envelope_api_url().to_string(),
                auth: dsn.to_auth(Some(config.user_agent())).to_string(),
                limiter: Mutex::new(RateLimiter::default()),
            }
        }

        fn limiter(&self) -> std::sync::MutexGuard<'_, RateLimiter> {
            // the limiter holds no invariants a panic could break
            self.limiter
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    impl std::fmt::Debug for HttpSender {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("HttpSender")
                .field("url", &self.url)
                .finish()
        }
    }

    impl ReportSender for HttpSender {
        fn send(&self, payload: ReportPayload) -> Result<(), TransportError> {
            if let Some(left) = self.limiter().is_disabled() {
                return Err(TransportError::RateLimited(left));
            }

            let envelope = Envelope::from(payload.to_event());
            let mut body = Vec::new();
            envelope
                .to_writer(&mut body)
                .map_err(|err| TransportError::Other(err.to_string()))?;

            let response = self
                .client
                .post(&self.url)
                .header("X-Sentry-Auth", &self.auth)
                .body(body)
                .send()?;

            let headers = response.headers();
            let mut limiter = self.limiter();
            if let Some(sentry_header) = headers
                .get("x-sentry-rate-limits")
                .and_then(|x| x.to_str().ok())
            {
                limiter.update_from_sentry_header(sentry_header);
            } else if let Some(retry_after) =
                headers.get(RETRY_AFTER).and_then(|x| x.to_str().ok())
            {
                limiter.update_from_retry_after(retry_after);
            } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
                limiter.update_from_429();
            }

            if response.status().is_success() {
                Ok(())
            } else {
                Err(TransportError::Rejected {
                    status: response.status().as_u16(),
                })
            }
        }
    }

}
