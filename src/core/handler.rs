//! Handler contract for record sinks
//!
//! Every sink owns a [`HandlerCore`] (level threshold, filter chain and
//! optional formatter) and implements [`Handler::emit`]. The provided
//! [`Handler::handle`] applies the same gate in front of every sink and routes
//! emission failures into [`Handler::handle_error`], so an I/O problem never
//! reaches the code that called `log`.

use super::diagnostics;
use super::error::{LoggerError, Result};
use super::filter::{Filter, FilterChain};
use super::log_level::LogLevel;
use super::record::Record;
use crate::format::Formatter;
use parking_lot::Mutex;
use std::sync::Arc;

/// Handler shared between the loggers it is attached to
pub type SharedHandler = Arc<Mutex<dyn Handler>>;

/// Wrap a handler for attachment to loggers
pub fn shared<H: Handler + 'static>(handler: H) -> SharedHandler {
    Arc::new(Mutex::new(handler))
}

/// Result of passing one record to one handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Rejected by the level threshold or the filter chain
    Filtered,
    /// Written or sent
    Emitted,
    /// `emit` failed and `handle_error` was invoked
    Failed,
}

/// State common to all handlers
#[derive(Debug, Clone)]
pub struct HandlerCore {
    level: LogLevel,
    filters: FilterChain,
    formatter: Option<Formatter>,
}

impl HandlerCore {
    pub fn new() -> Self {
        Self {
            level: LogLevel::Trace,
            filters: FilterChain::new(),
            formatter: None,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn set_filters(&mut self, filters: FilterChain) {
        self.filters = filters;
    }

    /// Configured formatter, or the library-wide default
    pub fn formatter(&self) -> &Formatter {
        self.formatter
            .as_ref()
            .unwrap_or_else(|| Formatter::shared_default())
    }

    pub fn set_formatter(&mut self, formatter: Formatter) {
        self.formatter = Some(formatter);
    }

    /// Level threshold and filter chain
    pub fn accepts(&self, record: &Record) -> bool {
        record.level >= self.level && self.filters.accepts(record)
    }

    pub fn format(&self, record: &Record) -> Result<String> {
        self.formatter().format(record)
    }
}

impl Default for HandlerCore {
    fn default() -> Self {
        Self::new()
    }
}

/// A record sink
///
/// A handler is locked while it handles a record. Records that a handler
/// logs from inside `emit` and that reach the same handler again on the same
/// thread are skipped and reported on the diagnostic stream.
pub trait Handler: Send {
    fn core(&self) -> &HandlerCore;

    fn core_mut(&mut self) -> &mut HandlerCore;

    /// Write or send one record that already passed the gate
    fn emit(&mut self, record: &Record) -> Result<()>;

    fn name(&self) -> &str;

    /// Push buffered output to the underlying resource
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release owned resources; calling it again is a no-op
    fn close(&mut self) {}

    /// Failure policy for `emit`; reports to the diagnostic stream by default
    fn handle_error(&mut self, record: &Record, error: &LoggerError) {
        diagnostics::report_handler_error(self.name(), record, error);
    }

    /// Gate, emit and absorb failures
    fn handle(&mut self, record: &Record) -> HandleOutcome {
        if !self.core().accepts(record) {
            return HandleOutcome::Filtered;
        }
        match self.emit(record) {
            Ok(()) => HandleOutcome::Emitted,
            Err(e) => {
                self.handle_error(record, &e);
                HandleOutcome::Failed
            }
        }
    }

    #[must_use]
    fn with_level(mut self, level: LogLevel) -> Self
    where
        Self: Sized,
    {
        self.core_mut().set_level(level);
        self
    }

    #[must_use]
    fn with_formatter(mut self, formatter: Formatter) -> Self
    where
        Self: Sized,
    {
        self.core_mut().set_formatter(formatter);
        self
    }

    #[must_use]
    fn with_filter(mut self, filter: Filter) -> Self
    where
        Self: Sized,
    {
        self.core_mut().add_filter(filter);
        self
    }
}

/// Handler that discards every record
#[derive(Debug, Default)]
pub struct NullHandler {
    core: HandlerCore,
}

impl NullHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Handler for NullHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn emit(&mut self, _record: &Record) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
