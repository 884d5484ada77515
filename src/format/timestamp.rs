//! Timestamp formatting utilities
//!
//! Provides the timestamp formats a [`Formatter`](super::Formatter) can render
//! into `asctime`. Custom patterns are strftime-like; a directive chrono does
//! not understand is emitted literally instead of failing the whole record.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date and time part of the standard format; milliseconds follow after a comma
pub const STANDARD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format options
///
/// # Examples
///
/// ```
/// use rust_log_dispatch::format::TimestampFormat;
/// use chrono::{TimeZone, Utc};
///
/// let ts = Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// assert_eq!(TimestampFormat::Standard.format(&ts), "2025-01-08 10:30:45,000");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// `2025-01-08 10:30:45,123`
    #[default]
    Standard,

    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    Iso8601,

    /// RFC 3339 format: `2025-01-08T10:30:45+00:00`
    Rfc3339,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Custom strftime pattern
    Custom(String),
}

impl TimestampFormat {
    /// Format a UTC instant
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        self.format_in(datetime)
    }

    /// Format an instant converted to the local time zone
    #[must_use]
    pub fn format_local(&self, datetime: &DateTime<Utc>) -> String {
        self.format_in(&datetime.with_timezone(&Local))
    }

    fn format_in<Tz: TimeZone>(&self, datetime: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        match self {
            TimestampFormat::Standard => format!(
                "{},{:03}",
                datetime.format(STANDARD_TIME_FORMAT),
                datetime.timestamp_subsec_millis()
            ),
            TimestampFormat::Iso8601 => datetime
                .with_timezone(&Utc)
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::Unix => datetime.timestamp().to_string(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(pattern) => render_strftime(datetime, pattern),
        }
    }

    /// Check if this is a Unix-based numeric format
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TimestampFormat::Unix | TimestampFormat::UnixMillis)
    }
}

/// Render `pattern` leaving unsupported directives as literal text
pub fn render_strftime<Tz: TimeZone>(datetime: &DateTime<Tz>, pattern: &str) -> String
where
    Tz::Offset: fmt::Display,
{
    let sanitized = escape_unknown_directives(pattern);
    datetime.format(&sanitized).to_string()
}

fn escape_unknown_directives(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut directive = String::from('%');
        while let Some(&m) = chars.peek() {
            if matches!(m, '-' | '_' | '0' | '.' | ':' | '#') || m.is_ascii_digit() {
                directive.push(m);
                chars.next();
            } else {
                break;
            }
        }
        if let Some(spec) = chars.next() {
            directive.push(spec);
        }

        let valid = directive.len() > 1
            && !StrftimeItems::new(&directive).any(|item| matches!(item, Item::Error));
        if valid {
            out.push_str(&directive);
        } else {
            out.push_str("%%");
            out.push_str(&directive[1..]);
        }
    }

    out
}
