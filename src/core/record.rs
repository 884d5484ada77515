//! Log record structure

use super::args::{FieldValue, LogArgs};
use super::exception::ExceptionInfo;
use super::log_level::LogLevel;
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use std::cell::RefCell;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

/// Get cached thread ID, computing and caching it on first access
fn get_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

/// Get cached thread name, computing and caching it on first access
fn get_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Snapshot of one log event, built once per log call
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub logger_name: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub message_template: String,
    pub args: LogArgs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    pub thread_id: String,
    pub thread_name: Option<String>,
    pub process_id: u32,
}

impl Record {
    pub fn new(
        logger_name: impl Into<String>,
        level: LogLevel,
        message_template: impl Into<String>,
    ) -> Self {
        Self {
            logger_name: logger_name.into(),
            level,
            timestamp: Utc::now(),
            message_template: message_template.into(),
            args: LogArgs::new(),
            exception: None,
            thread_id: get_thread_id(),
            thread_name: get_thread_name(),
            process_id: std::process::id(),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: LogArgs) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.args.add_field(key, value);
        self
    }

    #[must_use]
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Creation time as fractional seconds since the epoch
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp.timestamp() as f64 + f64::from(self.timestamp.nanosecond()) / 1e9
    }

    /// Millisecond part of the creation time
    pub fn msecs(&self) -> u32 {
        self.timestamp.timestamp_subsec_millis()
    }

    /// Thread name when set, thread id otherwise
    pub fn thread_label(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.thread_id)
    }
}
