//! Named loggers and record dispatch
//!
//! A [`Logger`] lives in a [`LoggerRegistry`](super::registry::LoggerRegistry)
//! and finds its parent by name: `a.b.c` propagates to `a.b`, then `a`, then
//! the root logger. Parents are looked up on demand rather than stored, so a
//! level change on an ancestor is visible to every descendant immediately.

use super::args::LogArgs;
use super::diagnostics::{self, display_name};
use super::error::LoggerError;
use super::exception::ExceptionInfo;
use super::filter::{Filter, FilterChain, HIERARCHY_SEPARATOR};
use super::handler::{HandleOutcome, SharedHandler};
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::record::Record;
use super::registry::RegistryShared;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Level of the root logger in a fresh registry
pub const DEFAULT_ROOT_LEVEL: LogLevel = LogLevel::Warn;

static NO_HANDLER_WARNING_ISSUED: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// Handlers currently handling a record on this thread
    static ACTIVE_HANDLERS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a handler busy on the current thread until dropped.
///
/// Handler locks are not reentrant: a handler that logs through a logger
/// whose records reach the same handler would otherwise deadlock.
struct ActiveHandler(usize);

impl ActiveHandler {
    fn enter(handler: &SharedHandler) -> Option<Self> {
        let key = Arc::as_ptr(handler) as *const () as usize;
        ACTIVE_HANDLERS.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&key) {
                return None;
            }
            active.push(key);
            Some(Self(key))
        })
    }
}

impl Drop for ActiveHandler {
    fn drop(&mut self) {
        ACTIVE_HANDLERS.with(|active| active.borrow_mut().retain(|key| *key != self.0));
    }
}

pub struct Logger {
    name: String,
    level: RwLock<Option<LogLevel>>,
    propagate: AtomicBool,
    handlers: RwLock<Vec<SharedHandler>>,
    filters: RwLock<FilterChain>,
    registry: Weak<RegistryShared>,
}

impl Logger {
    pub(crate) fn new(name: String, registry: Weak<RegistryShared>) -> Self {
        let level = if name.is_empty() {
            Some(DEFAULT_ROOT_LEVEL)
        } else {
            None
        };
        Self {
            name,
            level: RwLock::new(level),
            propagate: AtomicBool::new(true),
            handlers: RwLock::new(Vec::new()),
            filters: RwLock::new(FilterChain::new()),
            registry,
        }
    }

    /// Full dotted name; empty for the root logger
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    /// Explicitly set level, if any
    pub fn level(&self) -> Option<LogLevel> {
        *self.level.read()
    }

    pub fn set_level(&self, level: LogLevel) {
        *self.level.write() = Some(level);
    }

    /// Inherit the level from the nearest ancestor again.
    ///
    /// The root logger always keeps a level; clearing it restores the default.
    pub fn clear_level(&self) {
        let mut level = self.level.write();
        *level = if self.is_root() {
            Some(DEFAULT_ROOT_LEVEL)
        } else {
            None
        };
    }

    pub fn propagate(&self) -> bool {
        self.propagate.load(Ordering::Relaxed)
    }

    pub fn set_propagate(&self, propagate: bool) {
        self.propagate.store(propagate, Ordering::Relaxed);
    }

    /// Nearest existing ancestor; `None` for the root logger
    pub fn parent(&self) -> Option<Arc<Logger>> {
        if self.is_root() {
            return None;
        }
        let registry = self.registry.upgrade()?;
        Some(registry.nearest_ancestor(&self.name))
    }

    /// Level of the nearest logger in the chain (itself first) with an explicit level
    pub fn effective_level(&self) -> LogLevel {
        if let Some(level) = self.level() {
            return level;
        }
        let mut ancestor = self.parent();
        while let Some(logger) = ancestor {
            if let Some(level) = logger.level() {
                return level;
            }
            ancestor = logger.parent();
        }
        DEFAULT_ROOT_LEVEL
    }

    /// Whether a record at `level` would pass this logger's threshold
    pub fn is_enabled_for(&self, level: LogLevel) -> bool {
        if let Some(registry) = self.registry.upgrade() {
            if registry.is_disabled(level) {
                return false;
            }
        }
        level >= self.effective_level()
    }

    /// Attach a handler; attaching the same handler twice is a no-op
    pub fn add_handler(&self, handler: SharedHandler) {
        let mut handlers = self.handlers.write();
        if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            handlers.push(handler);
        }
    }

    pub fn remove_handler(&self, handler: &SharedHandler) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        handlers.len() != before
    }

    /// Detach and return every handler
    pub fn clear_handlers(&self) -> Vec<SharedHandler> {
        std::mem::take(&mut *self.handlers.write())
    }

    pub fn handlers(&self) -> Vec<SharedHandler> {
        self.handlers.read().clone()
    }

    pub fn has_handlers(&self) -> bool {
        !self.handlers.read().is_empty()
    }

    pub fn add_filter(&self, filter: Filter) {
        self.filters.write().push(filter);
    }

    pub fn set_filters(&self, filters: FilterChain) {
        *self.filters.write() = filters;
    }

    pub fn log(&self, level: LogLevel, template: impl Into<String>, args: LogArgs) {
        if !self.is_enabled_for(level) {
            return;
        }
        let record = Record::new(self.name.clone(), level, template).with_args(args);
        self.handle(&record);
    }

    pub fn log_exception(
        &self,
        level: LogLevel,
        template: impl Into<String>,
        args: LogArgs,
        exception: ExceptionInfo,
    ) {
        if !self.is_enabled_for(level) {
            return;
        }
        let record = Record::new(self.name.clone(), level, template)
            .with_args(args)
            .with_exception(exception);
        self.handle(&record);
    }

    /// Log at error level with captured error information
    pub fn exception(&self, template: impl Into<String>, args: LogArgs, exception: ExceptionInfo) {
        self.log_exception(LogLevel::Error, template, args, exception);
    }

    /// Dispatch an already built record, applying this logger's filters
    pub fn handle(&self, record: &Record) {
        if !self.filters.read().accepts(record) {
            return;
        }
        self.call_handlers(record);
    }

    /// Pass the record to this logger's handlers and those of its ancestors
    /// until a logger with propagation disabled has been visited.
    pub fn call_handlers(&self, record: &Record) {
        let registry = self.registry.upgrade();
        let metrics = registry.as_deref().map(RegistryShared::metrics);

        let mut found = self.dispatch_local(record, metrics);
        if self.propagate() {
            let mut ancestor = self.parent();
            while let Some(logger) = ancestor {
                found += logger.dispatch_local(record, metrics);
                if !logger.propagate() {
                    break;
                }
                ancestor = logger.parent();
            }
        }

        if found == 0 {
            if let Some(metrics) = metrics {
                metrics.record_unhandled();
            }
            warn_no_handlers(&self.name);
        } else if let Some(metrics) = metrics {
            metrics.record_dispatched();
        }
    }

    /// Per-handler panic isolation: one failing sink cannot stop the others.
    fn dispatch_local(&self, record: &Record, metrics: Option<&LoggerMetrics>) -> usize {
        let handlers = self.handlers();
        for handler in &handlers {
            let Some(_active) = ActiveHandler::enter(handler) else {
                diagnostics::report(&format!(
                    "[LOGGER ERROR] Record from logger '{}' skipped: handler is already handling a record on this thread",
                    display_name(&self.name)
                ));
                if let Some(metrics) = metrics {
                    metrics.record_handler_error();
                }
                continue;
            };
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler.lock().handle(record)
            }));

            match outcome {
                Ok(HandleOutcome::Failed) => {
                    if let Some(metrics) = metrics {
                        metrics.record_handler_error();
                    }
                }
                Ok(_) => {}
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    let handler_name = handler
                        .try_lock()
                        .map_or_else(|| "unknown".to_string(), |h| h.name().to_string());
                    let error = LoggerError::HandlerPanic {
                        handler: handler_name,
                        message: panic_msg,
                    };
                    diagnostics::report(&format!(
                        "[LOGGER CRITICAL] {} (logger '{}'). Other handlers continue to function.",
                        error,
                        display_name(&self.name)
                    ));
                    if let Some(metrics) = metrics {
                        metrics.record_handler_panic();
                    }
                }
            }
        }
        handlers.len()
    }

    #[inline]
    pub fn trace(&self, template: impl Into<String>) {
        self.log(LogLevel::Trace, template, LogArgs::new());
    }

    #[inline]
    pub fn debug(&self, template: impl Into<String>) {
        self.log(LogLevel::Debug, template, LogArgs::new());
    }

    #[inline]
    pub fn info(&self, template: impl Into<String>) {
        self.log(LogLevel::Info, template, LogArgs::new());
    }

    #[inline]
    pub fn warn(&self, template: impl Into<String>) {
        self.log(LogLevel::Warn, template, LogArgs::new());
    }

    #[inline]
    pub fn error(&self, template: impl Into<String>) {
        self.log(LogLevel::Error, template, LogArgs::new());
    }

    #[inline]
    pub fn fatal(&self, template: impl Into<String>) {
        self.log(LogLevel::Fatal, template, LogArgs::new());
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &display_name(&self.name))
            .field("level", &self.level())
            .field("propagate", &self.propagate())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

/// Report once per process that a record found no handler
fn warn_no_handlers(name: &str) {
    if !NO_HANDLER_WARNING_ISSUED.swap(true, Ordering::SeqCst) {
        diagnostics::report(&format!(
            "[LOGGER WARNING] No handlers could be found for logger \"{}\"",
            display_name(name)
        ));
    }
}

/// Whether the one-time "no handlers" warning has been written
pub fn no_handler_warning_issued() -> bool {
    NO_HANDLER_WARNING_ISSUED.load(Ordering::SeqCst)
}

/// Parent name of a dotted logger name; `""` (root) for top-level names
pub(crate) fn parent_name(name: &str) -> Option<&str> {
    if name.is_empty() {
        return None;
    }
    Some(
        name.rfind(HIERARCHY_SEPARATOR)
            .map_or("", |idx| &name[..idx]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{LoggerError, Result};
    use crate::core::handler::{shared, Handler, HandlerCore};
    use crate::core::registry::LoggerRegistry;
    use crate::format::Formatter;
    use parking_lot::Mutex;

    /// Handler writing formatted lines into a shared vector
    struct Capture {
        core: HandlerCore,
        lines: Arc<Mutex<Vec<String>>>,
    }

    fn capture() -> (SharedHandler, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let mut core = HandlerCore::new();
        core.set_formatter(Formatter::new("%(name)s:%(levelname)s:%(message)s"));
        let handler = shared(Capture {
            core,
            lines: Arc::clone(&lines),
        });
        (handler, lines)
    }

    impl Handler for Capture {
        fn core(&self) -> &HandlerCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut HandlerCore {
            &mut self.core
        }

        fn emit(&mut self, record: &Record) -> Result<()> {
            let line = self.core.format(record)?;
            self.lines.lock().push(line);
            Ok(())
        }

        fn name(&self) -> &str {
            "capture"
        }
    }

    struct Panicking {
        core: HandlerCore,
    }

    impl Handler for Panicking {
        fn core(&self) -> &HandlerCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut HandlerCore {
            &mut self.core
        }

        fn emit(&mut self, _record: &Record) -> Result<()> {
            panic!("sink exploded");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct Failing {
        core: HandlerCore,
    }

    impl Handler for Failing {
        fn core(&self) -> &HandlerCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut HandlerCore {
            &mut self.core
        }

        fn emit(&mut self, _record: &Record) -> Result<()> {
            Err(LoggerError::other("disk full"))
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn handle_error(&mut self, _record: &Record, _error: &LoggerError) {}
    }

    #[test]
    fn test_parent_name() {
        assert_eq!(parent_name("a.b.c"), Some("a.b"));
        assert_eq!(parent_name("a"), Some(""));
        assert_eq!(parent_name(""), None);
    }

    #[test]
    fn test_effective_level_inherits_from_nearest_ancestor() {
        let registry = LoggerRegistry::new();
        let child = registry.get_logger("app.db.pool");
        let mid = registry.get_logger("app.db");

        assert_eq!(child.effective_level(), DEFAULT_ROOT_LEVEL);

        mid.set_level(LogLevel::Debug);
        assert_eq!(child.effective_level(), LogLevel::Debug);

        registry.root().set_level(LogLevel::Error);
        assert_eq!(child.effective_level(), LogLevel::Debug);

        mid.clear_level();
        assert_eq!(child.effective_level(), LogLevel::Error);
    }

    #[test]
    fn test_level_change_after_child_creation_is_visible() {
        let registry = LoggerRegistry::new();
        let parent = registry.get_logger("svc");
        let child = registry.get_logger("svc.worker");
        parent.set_level(LogLevel::Info);
        assert!(child.is_enabled_for(LogLevel::Info));

        parent.set_level(LogLevel::Fatal);
        assert!(!child.is_enabled_for(LogLevel::Error));
    }

    #[test]
    fn test_root_level_cannot_be_cleared() {
        let registry = LoggerRegistry::new();
        let root = registry.root();
        root.set_level(LogLevel::Trace);
        root.clear_level();
        assert_eq!(root.level(), Some(DEFAULT_ROOT_LEVEL));
    }

    #[test]
    fn test_propagation_to_ancestors() {
        let registry = LoggerRegistry::new();
        registry.root().set_level(LogLevel::Trace);
        let (root_handler, root_lines) = capture();
        let (mid_handler, mid_lines) = capture();
        registry.root().add_handler(root_handler);
        registry.get_logger("a").add_handler(mid_handler);

        registry.get_logger("a.b").info("hello");

        assert_eq!(*mid_lines.lock(), vec!["a.b:INFO:hello".to_string()]);
        assert_eq!(*root_lines.lock(), vec!["a.b:INFO:hello".to_string()]);
    }

    #[test]
    fn test_propagation_stops_after_non_propagating_logger() {
        let registry = LoggerRegistry::new();
        registry.root().set_level(LogLevel::Trace);
        let (root_handler, root_lines) = capture();
        let (mid_handler, mid_lines) = capture();
        registry.root().add_handler(root_handler);
        let mid = registry.get_logger("a");
        mid.add_handler(mid_handler);
        mid.set_propagate(false);

        registry.get_logger("a.b").warn("stop here");

        assert_eq!(mid_lines.lock().len(), 1);
        assert!(root_lines.lock().is_empty());
    }

    #[test]
    fn test_logger_level_blocks_before_handlers() {
        let registry = LoggerRegistry::new();
        let (handler, lines) = capture();
        let logger = registry.get_logger("quiet");
        logger.add_handler(handler);
        logger.set_level(LogLevel::Error);

        logger.warn("ignored");
        logger.error("kept");

        assert_eq!(*lines.lock(), vec!["quiet:ERROR:kept".to_string()]);
    }

    #[test]
    fn test_logger_filters() {
        let registry = LoggerRegistry::new();
        let (handler, lines) = capture();
        let logger = registry.get_logger("f");
        logger.set_level(LogLevel::Trace);
        logger.add_handler(handler);
        logger.add_filter(Filter::level(LogLevel::Warn).negate());

        logger.info("passes");
        logger.error("blocked");

        assert_eq!(*lines.lock(), vec!["f:INFO:passes".to_string()]);
    }

    #[test]
    fn test_duplicate_handler_attached_once() {
        let registry = LoggerRegistry::new();
        let (handler, lines) = capture();
        let logger = registry.get_logger("dup");
        logger.add_handler(Arc::clone(&handler));
        logger.add_handler(Arc::clone(&handler));
        logger.error("once");

        assert_eq!(lines.lock().len(), 1);
        assert!(logger.remove_handler(&handler));
        assert!(!logger.has_handlers());
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let registry = LoggerRegistry::new();
        let (handler, lines) = capture();
        let logger = registry.get_logger("isolated");
        logger.add_handler(shared(Panicking {
            core: HandlerCore::new(),
        }));
        logger.add_handler(handler);

        logger.error("still delivered");

        assert_eq!(lines.lock().len(), 1);
        assert_eq!(registry.metrics().handler_panics(), 1);
    }

    #[test]
    fn test_failed_emissions_counted() {
        let registry = LoggerRegistry::new();
        let logger = registry.get_logger("fails");
        logger.add_handler(shared(Failing {
            core: HandlerCore::new(),
        }));

        logger.error("one");
        logger.error("two");

        assert_eq!(registry.metrics().handler_errors(), 2);
        assert_eq!(registry.metrics().records_dispatched(), 2);
    }

    #[test]
    fn test_unhandled_records_counted() {
        let registry = LoggerRegistry::new();
        registry.get_logger("nobody.listens").error("lost");
        assert_eq!(registry.metrics().unhandled_records(), 1);
        assert!(no_handler_warning_issued());
    }

    #[test]
    fn test_registry_disable() {
        let registry = LoggerRegistry::new();
        let (handler, lines) = capture();
        let logger = registry.get_logger("d");
        logger.add_handler(handler);
        registry.disable(LogLevel::Error);

        logger.error("dropped");
        logger.fatal("kept");
        registry.enable_all();
        logger.error("kept too");

        assert_eq!(lines.lock().len(), 2);
    }

    #[test]
    fn test_exception_record() {
        let registry = LoggerRegistry::new();
        let (handler, lines) = capture();
        let logger = registry.get_logger("exc");
        logger.add_handler(handler);

        logger.exception(
            "failed %(op)s",
            LogArgs::new().with_field("op", "sync"),
            ExceptionInfo::new("Timeout", "after 5s"),
        );

        assert_eq!(
            *lines.lock(),
            vec!["exc:ERROR:failed sync\nTimeout: after 5s".to_string()]
        );
    }

    /// Handler that logs through the hierarchy it is attached to
    struct Echo {
        core: HandlerCore,
        logger: Arc<Logger>,
        emitted: Arc<Mutex<usize>>,
    }

    impl Handler for Echo {
        fn core(&self) -> &HandlerCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut HandlerCore {
            &mut self.core
        }

        fn emit(&mut self, _record: &Record) -> Result<()> {
            *self.emitted.lock() += 1;
            self.logger.error("echo");
            Ok(())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn test_handler_logging_into_itself_is_skipped() {
        let registry = LoggerRegistry::new();
        let parent = registry.get_logger("loop");
        let child = registry.get_logger("loop.child");
        let emitted = Arc::new(Mutex::new(0));
        let (other, lines) = capture();

        parent.add_handler(shared(Echo {
            core: HandlerCore::new(),
            logger: Arc::clone(&child),
            emitted: Arc::clone(&emitted),
        }));
        parent.add_handler(other);

        child.error("outer");

        assert_eq!(*emitted.lock(), 1);
        assert_eq!(
            *lines.lock(),
            vec!["loop.child:ERROR:echo".to_string(), "loop.child:ERROR:outer".to_string()]
        );
        assert_eq!(registry.metrics().handler_errors(), 1);
    }
}
