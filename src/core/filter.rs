//! Record predicates and filter chains

use super::log_level::LogLevel;
use super::record::Record;
use std::fmt;
use std::sync::Arc;

/// Separator between the components of a logger name
pub const HIERARCHY_SEPARATOR: char = '.';

/// True if `name` equals `prefix` or lies below it in the hierarchy.
///
/// An empty prefix matches every name.
pub fn is_within(prefix: &str, name: &str) -> bool {
    if prefix.is_empty() || name == prefix {
        return true;
    }
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with(HIERARCHY_SEPARATOR))
}

/// Stateless predicate over a record
#[derive(Clone)]
pub enum Filter {
    /// Accept records at or above the level
    Level(LogLevel),
    /// Accept records from the named logger and its descendants
    Name(String),
    /// Invert the inner filter
    Not(Box<Filter>),
    /// Caller-supplied predicate
    Custom(Arc<dyn Fn(&Record) -> bool + Send + Sync>),
}

impl Filter {
    pub fn level(level: LogLevel) -> Self {
        Filter::Level(level)
    }

    pub fn name(prefix: impl Into<String>) -> Self {
        Filter::Name(prefix.into())
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Filter::Custom(Arc::new(predicate))
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    pub fn accepts(&self, record: &Record) -> bool {
        match self {
            Filter::Level(min) => record.level >= *min,
            Filter::Name(prefix) => is_within(prefix, &record.logger_name),
            Filter::Not(inner) => !inner.accepts(record),
            Filter::Custom(predicate) => predicate(record),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Level(level) => f.debug_tuple("Level").field(level).finish(),
            Filter::Name(prefix) => f.debug_tuple("Name").field(prefix).finish(),
            Filter::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Filter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Ordered conjunction of filters, evaluated with short-circuit
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn accepts(&self, record: &Record) -> bool {
        self.filters.iter().all(|filter| filter.accepts(record))
    }
}

impl FromIterator<Filter> for FilterChain {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(name: &str, level: LogLevel) -> Record {
        Record::new(name, level, "msg")
    }

    #[test]
    fn test_level_filter() {
        let filter = Filter::level(LogLevel::Warn);
        assert!(filter.accepts(&record("a", LogLevel::Warn)));
        assert!(filter.accepts(&record("a", LogLevel::Fatal)));
        assert!(!filter.accepts(&record("a", LogLevel::Info)));
    }

    #[test]
    fn test_not_level_accepts_lower_levels() {
        let filter = Filter::level(LogLevel::Warn).negate();
        assert!(filter.accepts(&record("a", LogLevel::Info)));
        assert!(!filter.accepts(&record("a", LogLevel::Error)));
    }

    #[test]
    fn test_name_filter_respects_separator_boundary() {
        let filter = Filter::name("a.b");
        assert!(filter.accepts(&record("a.b", LogLevel::Info)));
        assert!(filter.accepts(&record("a.b.c", LogLevel::Info)));
        assert!(!filter.accepts(&record("a.bc", LogLevel::Info)));
        assert!(!filter.accepts(&record("a", LogLevel::Info)));
    }

    #[test]
    fn test_empty_name_filter_accepts_everything() {
        assert!(Filter::name("").accepts(&record("anything.at.all", LogLevel::Info)));
    }

    #[test]
    fn test_chain_short_circuits_on_first_rejection() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let chain = FilterChain::new()
            .with(Filter::level(LogLevel::Error))
            .with(Filter::custom(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }));

        assert!(!chain.accepts(&record("a", LogLevel::Info)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(chain.accepts(&record("a", LogLevel::Error)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_chain_accepts() {
        assert!(FilterChain::new().accepts(&record("x", LogLevel::Trace)));
    }
}
