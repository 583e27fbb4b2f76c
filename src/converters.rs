//! Translation of log events into reports.

use std::collections::BTreeMap;

use sentry_types::protocol::v7::{Event, Exception, Frame, Level, Map, Stacktrace};
use serde_json::Value;

use crate::error::UnsupportedLevelError;
use crate::event::{ExceptionInfo, LogEvent, StackFrame};
use crate::levels::map_level;
use crate::options::TargetConfig;

/// What a report is about.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportContent {
    /// A plain message.
    Message(String),
    /// An exception, together with the rendered log message.
    Exception {
        /// The reported exception.
        exception: ExceptionInfo,
        /// The rendered log message.
        message: String,
    },
}

/// A report ready to be handed to a [`ReportSender`](crate::ReportSender).
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPayload {
    /// The severity of the report.
    pub severity: Level,
    /// The name of the logger that emitted the event.
    pub logger_name: String,
    /// The message or exception.
    pub content: ReportContent,
    /// Indexed, searchable properties.
    pub tags: BTreeMap<String, String>,
    /// Opaque properties.
    pub extra: BTreeMap<String, Value>,
}

/// Why an event was not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The event level maps to off.
    LevelOff,
    /// The event has no exception and only exceptions are reported.
    NoException,
    /// The rendered message is empty.
    EmptyMessage,
}

/// The result of translating a [`LogEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// The event should be reported.
    Report(ReportPayload),
    /// The event is dropped.
    Skip(SkipReason),
}

/// Flattens properties into string pairs.
///
/// Pairs with a `null` key or value are dropped.  Keys that collide once
/// stringified are merged, joining their values with a comma in the order
/// they were seen.  The first-seen order of keys is preserved.
///
/// # Examples
///
/// ```
/// use serde_json::Value;
/// use sentry_log_target::flatten_properties;
///
/// let properties = vec![
///     (Value::from("id"), Value::from(1)),
///     (Value::from(1), Value::from("one")),
///     (Value::from("1"), Value::from("uno")),
///     (Value::from("gone"), Value::Null),
/// ];
/// assert_eq!(
///     flatten_properties(&properties),
///     vec![
///         ("id".to_string(), "1".to_string()),
///         ("1".to_string(), "one,uno".to_string()),
///     ]
/// );
/// ```
pub fn flatten_properties(properties: &[(Value, Value)]) -> Vec<(String, String)> {
    let mut rv: Vec<(String, String)> = Vec::with_capacity(properties.len());
    for (key, value) in properties {
        let (key, value) = match (stringify(key), stringify(value)) {
            (Some(key), Some(value)) => (key, value),
            _ => continue,
        };
        match rv.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(&value);
            }
            None => rv.push((key, value)),
        }
    }
    rv
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Splits flattened properties into tags and extra data.
///
/// With `send_all_properties_as_tags` every property becomes a tag.
/// Otherwise only the properties named in `tag_property_names` are tags and
/// the remaining ones are extra data.
pub fn partition_properties(
    properties: Vec<(String, String)>,
    config: &TargetConfig,
) -> (BTreeMap<String, String>, BTreeMap<String, Value>) {
    if config.send_all_properties_as_tags() {
        return (properties.into_iter().collect(), BTreeMap::new());
    }

    let names = config.tag_property_names();
    let mut tags = BTreeMap::new();
    let mut extra = BTreeMap::new();
    for (key, value) in properties {
        if names.contains(&key) {
            tags.insert(key, value);
        } else {
            extra.insert(key, Value::String(value));
        }
    }
    (tags, extra)
}

/// Translates a [`LogEvent`] into a report.
///
/// `rendered` is the log message as produced by the renderer of the target.
/// The only error is an event level without a Sentry counterpart.
///
/// # Examples
///
/// ```
/// use sentry_log_target::{levels, translate, LogEvent, SkipReason, TargetConfig, Translation};
///
/// let config = TargetConfig::new("https://public@sentry.example.com/1").unwrap();
/// let event = LogEvent::new(levels::OFF, "app", "ignored");
/// assert_eq!(
///     translate(&event, &config, "ignored").unwrap(),
///     Translation::Skip(SkipReason::LevelOff)
/// );
/// ```
pub fn translate(
    event: &LogEvent,
    config: &TargetConfig,
    rendered: &str,
) -> Result<Translation, UnsupportedLevelError> {
    let severity = match map_level(event.level)? {
        Some(severity) => severity,
        None => return Ok(Translation::Skip(SkipReason::LevelOff)),
    };

    let content = match event.exception {
        Some(ref exception) => ReportContent::Exception {
            exception: exception.clone(),
            message: rendered.to_owned(),
        },
        None if config.ignore_events_with_no_exception() => {
            return Ok(Translation::Skip(SkipReason::NoException))
        }
        None if rendered.is_empty() => return Ok(Translation::Skip(SkipReason::EmptyMessage)),
        None => ReportContent::Message(rendered.to_owned()),
    };

    let (tags, extra) = partition_properties(flatten_properties(&event.properties), config);

    Ok(Translation::Report(ReportPayload {
        severity,
        logger_name: event.logger_name.clone(),
        content,
        tags,
        extra,
    }))
}

fn convert_frame(frame: &StackFrame) -> Frame {
    Frame {
        function: frame.function.clone(),
        module: frame.module.clone(),
        filename: frame.filename.clone(),
        lineno: frame.lineno,
        ..Default::default()
    }
}

fn convert_exception(exception: &ExceptionInfo) -> Exception {
    Exception {
        ty: exception.ty.clone(),
        module: exception.module.clone(),
        value: Some(exception.message.clone()),
        stacktrace: if exception.frames.is_empty() {
            None
        } else {
            Some(Stacktrace {
                frames: exception.frames.iter().map(convert_frame).collect(),
                ..Default::default()
            })
        },
        ..Default::default()
    }
}

impl ReportPayload {
    /// Converts the payload into a Sentry protocol [`Event`].
    ///
    /// Chained exceptions are sorted oldest to newest, as the protocol
    /// expects.  The rendered message of an exception report becomes the
    /// event message.
    pub fn to_event(&self) -> Event<'static> {
        let (message, exception) = match self.content {
            ReportContent::Message(ref message) => (message.clone(), Vec::new()),
            ReportContent::Exception {
                ref exception,
                ref message,
            } => {
                let mut exceptions: Vec<_> = exception.chain().map(convert_exception).collect();
                exceptions.reverse();
                (message.clone(), exceptions)
            }
        };

        Event {
            level: self.severity,
            logger: Some(self.logger_name.clone()),
            message: if message.is_empty() {
                None
            } else {
                Some(message)
            },
            exception: exception.into(),
            tags: self
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
            extra: self
                .extra
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels;

    fn config() -> TargetConfig {
        TargetConfig::new("https://public@sentry.invalid/1").unwrap()
    }

    fn report(translation: Translation) -> ReportPayload {
        match translation {
            Translation::Report(payload) => payload,
            Translation::Skip(reason) => panic!("unexpected skip: {:?}", reason),
        }
    }

    #[test]
    fn test_flatten_drops_nulls() {
        let properties = vec![
            (Value::Null, Value::from("no key")),
            (Value::from("no value"), Value::Null),
            (Value::from("kept"), Value::from(true)),
        ];
        assert_eq!(
            flatten_properties(&properties),
            vec![("kept".to_string(), "true".to_string())]
        );
    }

    #[test]
    fn test_flatten_joins_collisions() {
        let properties = vec![
            (Value::from("a"), Value::from("x")),
            (Value::from("b"), Value::from(2.5)),
            (Value::from("a"), Value::from("y")),
            (Value::from("a"), Value::from(vec![1, 2])),
        ];
        assert_eq!(
            flatten_properties(&properties),
            vec![
                ("a".to_string(), "x,y,[1,2]".to_string()),
                ("b".to_string(), "2.5".to_string()),
            ]
        );
    }

    #[test]
    fn test_partition_with_allowlist() {
        let config = TargetConfig::builder()
            .dsn("https://public@sentry.invalid/1")
            .tag_property_names("tag1, missing")
            .build()
            .unwrap();
        let properties = vec![
            ("tag1".to_string(), "abcde".to_string()),
            ("tag2".to_string(), "fghij".to_string()),
        ];
        let (tags, extra) = partition_properties(properties, &config);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags["tag1"], "abcde");
        assert!(!tags.contains_key("missing"));
        assert_eq!(extra.len(), 1);
        assert_eq!(extra["tag2"], Value::from("fghij"));
    }

    #[test]
    fn test_partition_all_as_tags() {
        let config = TargetConfig::builder()
            .dsn("https://public@sentry.invalid/1")
            .send_all_properties_as_tags(true)
            .tag_property_names("tag1")
            .build()
            .unwrap();
        let properties = vec![
            ("tag1".to_string(), "abcde".to_string()),
            ("tag2".to_string(), "fghij".to_string()),
        ];
        let (tags, extra) = partition_properties(properties, &config);
        assert_eq!(tags.len(), 2);
        assert!(extra.is_empty());
    }

    #[test]
    fn test_translate_message() {
        let event = LogEvent::new(levels::WARN, "app", "disk almost full")
            .with_property("volume", "/var");
        let payload = report(translate(&event, &config(), "disk almost full").unwrap());
        assert_eq!(payload.severity, Level::Warning);
        assert_eq!(payload.logger_name, "app");
        assert_eq!(
            payload.content,
            ReportContent::Message("disk almost full".into())
        );
        assert!(payload.tags.is_empty());
        assert_eq!(payload.extra["volume"], Value::from("/var"));
    }

    #[test]
    fn test_translate_skips() {
        let config = config();
        let event = LogEvent::new(levels::OFF, "app", "hello");
        assert_eq!(
            translate(&event, &config, "hello").unwrap(),
            Translation::Skip(SkipReason::LevelOff)
        );

        let event = LogEvent::new(levels::INFO, "app", "");
        assert_eq!(
            translate(&event, &config, "").unwrap(),
            Translation::Skip(SkipReason::EmptyMessage)
        );

        let config = TargetConfig::builder()
            .dsn("https://public@sentry.invalid/1")
            .ignore_events_with_no_exception(true)
            .build()
            .unwrap();
        let event = LogEvent::new(levels::ERROR, "app", "hello");
        assert_eq!(
            translate(&event, &config, "hello").unwrap(),
            Translation::Skip(SkipReason::NoException)
        );
    }

    #[test]
    fn test_translate_unsupported_level() {
        let event = LogEvent::new(9, "app", "hello");
        assert_eq!(
            translate(&event, &config(), "hello"),
            Err(UnsupportedLevelError { ordinal: 9 })
        );
    }

    #[test]
    fn test_exception_with_empty_message_is_reported() {
        let event = LogEvent::new(levels::FATAL, "app", "")
            .with_exception(ExceptionInfo::new("Panic", "Oh No!"));
        let payload = report(translate(&event, &config(), "").unwrap());
        assert_eq!(payload.severity, Level::Fatal);
        match payload.content {
            ReportContent::Exception { exception, message } => {
                assert_eq!(exception.message, "Oh No!");
                assert_eq!(message, "");
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_to_event() {
        let exception = ExceptionInfo::new("OuterError", "outer")
            .with_frame(StackFrame {
                filename: Some("src/main.rs".into()),
                lineno: Some(12),
                ..Default::default()
            })
            .with_source(ExceptionInfo::new("InnerError", "inner"));
        let event = LogEvent::new(levels::ERROR, "app::worker", "job failed")
            .with_exception(exception)
            .with_property("tag1", "abcde")
            .with_property("other", 42);
        let config = TargetConfig::builder()
            .dsn("https://public@sentry.invalid/1")
            .tag_property_names("tag1")
            .build()
            .unwrap();
        let payload = report(translate(&event, &config, "job failed").unwrap());

        let event = payload.to_event();
        assert_eq!(event.level, Level::Error);
        assert_eq!(event.logger.as_deref(), Some("app::worker"));
        assert_eq!(event.message.as_deref(), Some("job failed"));
        assert_eq!(event.exception.len(), 2);
        assert_eq!(&event.exception[0].ty, "InnerError");
        assert_eq!(&event.exception[1].ty, "OuterError");
        assert_eq!(event.exception[1].value.as_deref(), Some("outer"));
        let frames = &event.exception[1].stacktrace.as_ref().unwrap().frames;
        assert_eq!(frames[0].lineno, Some(12));
        assert_eq!(event.tags["tag1"], "abcde");
        assert_eq!(event.extra["other"], Value::from("42"));
    }
}
