//! Record formatting
//!
//! A [`Formatter`] interpolates the record's message, renders its timestamp
//! and substitutes both, together with level and logger name, into an output
//! template written in the same placeholder style. Available template fields:
//!
//! | field        | value                                   |
//! |--------------|-----------------------------------------|
//! | `message`    | interpolated message                    |
//! | `asctime`    | formatted timestamp                     |
//! | `levelname`  | `INFO`, `WARN`, ...                     |
//! | `levelno`    | numeric severity                        |
//! | `name`       | logger name (`root` for the root logger) |
//! | `created`    | seconds since the epoch (float)         |
//! | `msecs`      | millisecond part of the timestamp       |
//! | `thread`     | thread id                               |
//! | `threadName` | thread name, or the id when unnamed     |
//! | `process`    | process id                              |
//!
//! A captured exception is appended on the following lines. No trailing
//! newline is produced; handlers frame lines themselves.

use super::interpolator::InterpolatorKind;
use super::timestamp::TimestampFormat;
use crate::core::args::LogArgs;
use crate::core::diagnostics::display_name;
use crate::core::error::Result;
use crate::core::record::Record;
use std::sync::OnceLock;

/// Output template used when none is configured (percent style)
pub const DEFAULT_FORMAT: &str = "%(asctime)s [%(levelname)s] %(name)s: %(message)s";

/// Output template used when none is configured (brace style)
pub const DEFAULT_BRACE_FORMAT: &str = "{asctime} [{levelname}] {name}: {message}";

/// Renders records into text
///
/// # Examples
///
/// ```
/// use rust_log_dispatch::format::{Formatter, InterpolatorKind};
/// use rust_log_dispatch::{LogLevel, Record};
///
/// let formatter = Formatter::new("{levelname} {name}: {message}")
///     .with_style(InterpolatorKind::Brace);
/// let record = Record::new("db", LogLevel::Warn, "pool at {pct}%").with_arg("pct", 95);
///
/// assert_eq!(formatter.format(&record).unwrap(), "WARN db: pool at 95%");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Formatter {
    format: String,
    time_format: TimestampFormat,
    style: InterpolatorKind,
    local_time: bool,
    escape_newlines: bool,
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            time_format: TimestampFormat::default(),
            style: InterpolatorKind::Percent,
            local_time: false,
            escape_newlines: true,
        }
    }
}

impl Formatter {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }

    /// Default brace-style formatter
    pub fn brace() -> Self {
        Self::new(DEFAULT_BRACE_FORMAT).with_style(InterpolatorKind::Brace)
    }

    /// Library-wide formatter used by handlers without their own
    pub fn shared_default() -> &'static Formatter {
        static DEFAULT: OnceLock<Formatter> = OnceLock::new();
        DEFAULT.get_or_init(Formatter::default)
    }

    #[must_use]
    pub fn with_style(mut self, style: InterpolatorKind) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.time_format = format;
        self
    }

    /// Set a strftime-like pattern for `asctime`
    #[must_use]
    pub fn with_time_format(mut self, pattern: &str) -> Self {
        self.time_format = TimestampFormat::Custom(pattern.to_string());
        self
    }

    /// Render timestamps in the local time zone instead of UTC
    #[must_use]
    pub fn with_local_time(mut self, local: bool) -> Self {
        self.local_time = local;
        self
    }

    /// Escape `\n`, `\r` and `\t` in the message to keep one record per line
    #[must_use]
    pub fn with_escape_newlines(mut self, escape: bool) -> Self {
        self.escape_newlines = escape;
        self
    }

    pub fn style(&self) -> InterpolatorKind {
        self.style
    }

    pub fn format_template(&self) -> &str {
        &self.format
    }

    /// Interpolate the record's message.
    ///
    /// Records without arguments keep their template verbatim, so literal
    /// placeholders in argument-less messages never fail.
    pub fn format_message(&self, record: &Record) -> Result<String> {
        let message = if record.args.is_empty() {
            record.message_template.clone()
        } else {
            self.style
                .interpolate(&record.message_template, &record.args)?
        };

        if self.escape_newlines {
            Ok(sanitize_message(&message))
        } else {
            Ok(message)
        }
    }

    pub fn format_time(&self, record: &Record) -> String {
        if self.local_time {
            self.time_format.format_local(&record.timestamp)
        } else {
            self.time_format.format(&record.timestamp)
        }
    }

    pub fn format(&self, record: &Record) -> Result<String> {
        let message = self.format_message(record)?;

        let fields = LogArgs::new()
            .with_field("message", message)
            .with_field("asctime", self.format_time(record))
            .with_field("levelname", record.level.to_str())
            .with_field("levelno", i64::from(record.level.as_u8()))
            .with_field("name", display_name(&record.logger_name))
            .with_field("created", record.timestamp_secs())
            .with_field("msecs", record.msecs())
            .with_field("thread", record.thread_id.as_str())
            .with_field("threadName", record.thread_label())
            .with_field("process", record.process_id);

        let mut line = self.style.interpolate(&self.format, &fields)?;

        if let Some(exception) = &record.exception {
            line.push('\n');
            line.push_str(&exception.render());
        }

        Ok(line)
    }
}

/// Replace line breaks and tabs with escape sequences
fn sanitize_message(message: &str) -> String {
    if !message.contains(['\n', '\r', '\t']) {
        return message.to_string();
    }
    message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
