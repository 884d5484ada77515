//! Dispatch metrics for observability
//!
//! Counters describing what happened to records after they passed a
//! logger's level check: delivered, rejected by every handler gate,
//! failed inside a handler, or dropped because no handler was found.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for registry-wide dispatch
///
/// # Example
///
/// ```
/// use rust_log_dispatch::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_dispatched();
/// metrics.record_handler_error();
///
/// assert_eq!(metrics.records_dispatched(), 1);
/// assert_eq!(metrics.handler_errors(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records handed to at least one handler
    records_dispatched: AtomicU64,

    /// Handler emissions that ended in `handle_error`
    handler_errors: AtomicU64,

    /// Records that found no handler in their propagation chain
    unhandled_records: AtomicU64,

    /// Handler panics caught during dispatch
    handler_panics: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            records_dispatched: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            unhandled_records: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn records_dispatched(&self) -> u64 {
        self.records_dispatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn handler_errors(&self) -> u64 {
        self.handler_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn unhandled_records(&self) -> u64 {
        self.unhandled_records.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn handler_panics(&self) -> u64 {
        self.handler_panics.load(Ordering::Relaxed)
    }

    /// Record a dispatched record; returns the previous count
    #[inline]
    pub fn record_dispatched(&self) -> u64 {
        self.records_dispatched.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_handler_error(&self) -> u64 {
        self.handler_errors.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_unhandled(&self) -> u64 {
        self.unhandled_records.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_handler_panic(&self) -> u64 {
        self.handler_panics.fetch_add(1, Ordering::Relaxed)
    }

    /// Failed emissions as a percentage of dispatched records (0.0 - 100.0)
    pub fn error_rate(&self) -> f64 {
        let dispatched = self.records_dispatched() as f64;
        if dispatched == 0.0 {
            0.0
        } else {
            (self.handler_errors() as f64 / dispatched) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.records_dispatched.store(0, Ordering::Relaxed);
        self.handler_errors.store(0, Ordering::Relaxed);
        self.unhandled_records.store(0, Ordering::Relaxed);
        self.handler_panics.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            records_dispatched: AtomicU64::new(self.records_dispatched()),
            handler_errors: AtomicU64::new(self.handler_errors()),
            unhandled_records: AtomicU64::new(self.unhandled_records()),
            handler_panics: AtomicU64::new(self.handler_panics()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.records_dispatched(), 0);
        assert_eq!(metrics.handler_errors(), 0);
        assert_eq!(metrics.unhandled_records(), 0);
        assert_eq!(metrics.handler_panics(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.record_unhandled(), 0);
        assert_eq!(metrics.record_unhandled(), 1);
        assert_eq!(metrics.unhandled_records(), 2);
    }

    #[test]
    fn test_error_rate() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.error_rate(), 0.0);

        for _ in 0..10 {
            metrics.record_dispatched();
        }
        metrics.record_handler_error();
        assert!((metrics.error_rate() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let metrics = LoggerMetrics::new();
        metrics.record_dispatched();

        let snapshot = metrics.clone();
        metrics.record_dispatched();
        metrics.reset();

        assert_eq!(snapshot.records_dispatched(), 1);
        assert_eq!(metrics.records_dispatched(), 0);
    }
}
