//! The log events consumed by the target.

use std::error::Error;

use log::kv::{self, Key, VisitSource};
use serde_json::Value;

use crate::levels::ordinal_from_log_level;

/// A single frame of a stacktrace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// The function name, if known.
    pub function: Option<String>,
    /// The module path of the frame.
    pub module: Option<String>,
    /// The source file.
    pub filename: Option<String>,
    /// The line within `filename`.
    pub lineno: Option<u64>,
}

/// An error attached to a log event.
///
/// Exceptions form a chain through [`source`](Self::source), outermost
/// error first, just like [`std::error::Error::source`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// The type name of the error.
    pub ty: String,
    /// The module the error type lives in.
    pub module: Option<String>,
    /// The error message.
    pub message: String,
    /// Stack frames, innermost last.
    pub frames: Vec<StackFrame>,
    /// The error that caused this one.
    pub source: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    /// Creates an exception from a type name and a message.
    pub fn new<T: Into<String>, M: Into<String>>(ty: T, message: M) -> ExceptionInfo {
        ExceptionInfo {
            ty: ty.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Creates an exception from a [`std::error::Error`], following its
    /// chain of sources.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentry_log_target::ExceptionInfo;
    ///
    /// let err = "NaN".parse::<usize>().unwrap_err();
    /// let exception = ExceptionInfo::from_error(&err);
    /// assert_eq!(exception.ty, "ParseIntError");
    /// assert_eq!(exception.message, "invalid digit found in string");
    /// ```
    pub fn from_error<E: Error + ?Sized>(err: &E) -> ExceptionInfo {
        ExceptionInfo {
            ty: parse_type_from_debug(err),
            module: None,
            message: err.to_string(),
            frames: Vec::new(),
            source: err
                .source()
                .map(|source| Box::new(ExceptionInfo::from_error(source))),
        }
    }

    /// Appends a stack frame.
    pub fn with_frame(mut self, frame: StackFrame) -> ExceptionInfo {
        self.frames.push(frame);
        self
    }

    /// Sets the causing exception.
    pub fn with_source(mut self, source: ExceptionInfo) -> ExceptionInfo {
        self.source = Some(Box::new(source));
        self
    }

    /// Iterates over this exception and its sources, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ExceptionInfo> {
        std::iter::successors(Some(self), |exc| exc.source.as_deref())
    }
}

/// Parses the type name from `Debug` output.
fn parse_type_from_debug<D: std::fmt::Debug + ?Sized>(d: &D) -> String {
    let dbg = format!("{:#?}", d);

    dbg.split(&[' ', '(', '{', '\r', '\n'][..])
        .next()
        .unwrap_or(&dbg)
        .trim()
        .to_owned()
}

/// Where in the source a log event was emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    /// The module path.
    pub module_path: Option<String>,
    /// The source file.
    pub file: Option<String>,
    /// The line within `file`.
    pub line: Option<u32>,
}

impl SourceLocation {
    fn to_frame(&self) -> StackFrame {
        StackFrame {
            function: None,
            module: self.module_path.clone(),
            filename: self.file.clone(),
            lineno: self.line.map(Into::into),
        }
    }
}

/// A structured log event.
///
/// Properties are kept as an ordered list of pairs.  Keys and values are
/// arbitrary JSON values; they are turned into strings when the event is
/// translated, and pairs with a `null` key or value are dropped at that
/// point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEvent {
    /// The level ordinal, see [`levels`](crate::levels).
    pub level: usize,
    /// The name of the logger that emitted the event.
    pub logger_name: String,
    /// The formatted log message.
    pub message: String,
    /// The error attached to the event.
    pub exception: Option<ExceptionInfo>,
    /// Contextual properties.
    pub properties: Vec<(Value, Value)>,
    /// The call site.
    pub location: Option<SourceLocation>,
}

impl LogEvent {
    /// Creates a new event without exception or properties.
    pub fn new<L: Into<String>, M: Into<String>>(
        level: usize,
        logger_name: L,
        message: M,
    ) -> LogEvent {
        LogEvent {
            level,
            logger_name: logger_name.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Attaches an exception.
    pub fn with_exception(mut self, exception: ExceptionInfo) -> LogEvent {
        self.exception = Some(exception);
        self
    }

    /// Attaches a [`std::error::Error`] as exception.
    pub fn with_error<E: Error + ?Sized>(self, err: &E) -> LogEvent {
        self.with_exception(ExceptionInfo::from_error(err))
    }

    /// Adds a property.
    pub fn with_property<K: Into<Value>, V: Into<Value>>(mut self, key: K, value: V) -> LogEvent {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Creates an event from a [`log::Record`].
    ///
    /// The key-values of the record become properties.  The first value that
    /// carries a [`std::error::Error`] becomes the exception of the event; the
    /// call site of the record is attached to it as a stack frame.
    pub fn from_record(record: &log::Record<'_>) -> LogEvent {
        let mut visitor = RecordVisitor::default();
        // our visitor never fails
        let _ = record.key_values().visit(&mut visitor);

        let location = SourceLocation {
            module_path: record.module_path().map(ToOwned::to_owned),
            file: record.file().map(ToOwned::to_owned),
            line: record.line(),
        };
        let exception = visitor
            .exception
            .map(|exception| exception.with_frame(location.to_frame()));

        LogEvent {
            level: ordinal_from_log_level(record.level()),
            logger_name: record.target().into(),
            message: format!("{}", record.args()),
            exception,
            properties: visitor.properties,
            location: Some(location),
        }
    }
}

#[derive(Default)]
struct RecordVisitor {
    properties: Vec<(Value, Value)>,
    exception: Option<ExceptionInfo>,
}

impl<'kvs> VisitSource<'kvs> for RecordVisitor {
    fn visit_pair(&mut self, key: Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        if self.exception.is_none() {
            if let Some(err) = value.to_borrowed_error() {
                self.exception = Some(ExceptionInfo::from_error(err));
                return Ok(());
            }
        }
        self.properties
            .push((Value::from(key.as_str()), value_from_kv(&value)));
        Ok(())
    }
}

fn value_from_kv(value: &kv::Value<'_>) -> Value {
    if let Some(b) = value.to_bool() {
        Value::from(b)
    } else if let Some(n) = value.to_i64() {
        Value::from(n)
    } else if let Some(n) = value.to_u64() {
        Value::from(n)
    } else if let Some(n) = value.to_f64() {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(n.to_string()))
    } else if let Some(s) = value.to_borrowed_str() {
        Value::from(s)
    } else {
        Value::from(value.to_string())
    }
}
