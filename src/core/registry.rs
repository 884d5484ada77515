//! Logger registry
//!
//! The registry maps names to loggers. Looking up `a.b.c` creates `a.b` and
//! `a` as well, so propagation always has a complete chain up to the root.
//! Creation is synchronized: one name resolves to exactly one [`Logger`].
//!
//! Most applications use one registry for the whole process. [`global`]
//! creates it lazily on first use; call [`LoggerRegistry::shutdown`] on it
//! before exit to flush and close every attached handler.

use super::handler::SharedHandler;
use super::log_level::LogLevel;
use super::logger::{parent_name, Logger};
use super::metrics::LoggerMetrics;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub(crate) struct RegistryShared {
    root: Arc<Logger>,
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
    disabled: RwLock<Option<LogLevel>>,
    metrics: LoggerMetrics,
}

impl RegistryShared {
    pub(crate) fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    pub(crate) fn is_disabled(&self, level: LogLevel) -> bool {
        matches!(*self.disabled.read(), Some(max) if level <= max)
    }

    /// Closest registered ancestor of `name`, falling back to the root
    pub(crate) fn nearest_ancestor(&self, name: &str) -> Arc<Logger> {
        let loggers = self.loggers.read();
        let mut current = parent_name(name);
        while let Some(candidate) = current {
            if candidate.is_empty() {
                break;
            }
            if let Some(logger) = loggers.get(candidate) {
                return Arc::clone(logger);
            }
            current = parent_name(candidate);
        }
        Arc::clone(&self.root)
    }
}

/// Name-to-logger mapping owning the hierarchy
///
/// Deliberately not `Clone`: the hierarchy must have a single identity.
///
/// # Example
///
/// ```
/// use rust_log_dispatch::{LoggerRegistry, LogLevel};
///
/// let registry = LoggerRegistry::new();
/// let db = registry.get_logger("app.db");
/// registry.get_logger("app").set_level(LogLevel::Debug);
///
/// assert_eq!(db.effective_level(), LogLevel::Debug);
/// assert!(registry.exists("app"));
/// ```
pub struct LoggerRegistry {
    shared: Arc<RegistryShared>,
}

impl LoggerRegistry {
    pub fn new() -> Self {
        let shared = Arc::new_cyclic(|weak| RegistryShared {
            root: Arc::new(Logger::new(String::new(), weak.clone())),
            loggers: RwLock::new(HashMap::new()),
            disabled: RwLock::new(None),
            metrics: LoggerMetrics::new(),
        });
        Self { shared }
    }

    pub fn root(&self) -> Arc<Logger> {
        Arc::clone(&self.shared.root)
    }

    /// Look up or create the logger for `name`, creating missing ancestors.
    ///
    /// `""` and `"root"` both name the root logger.
    pub fn get_logger(&self, name: &str) -> Arc<Logger> {
        if name.is_empty() || name == "root" {
            return self.root();
        }
        if let Some(logger) = self.shared.loggers.read().get(name) {
            return Arc::clone(logger);
        }

        let mut loggers = self.shared.loggers.write();
        let mut prefix_end = 0;
        for (idx, _) in name.match_indices(super::filter::HIERARCHY_SEPARATOR) {
            let ancestor = &name[..idx];
            if idx > prefix_end && !loggers.contains_key(ancestor) {
                loggers.insert(
                    ancestor.to_string(),
                    Arc::new(Logger::new(ancestor.to_string(), Arc::downgrade(&self.shared))),
                );
            }
            prefix_end = idx + 1;
        }
        Arc::clone(loggers.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Logger::new(name.to_string(), Arc::downgrade(&self.shared)))
        }))
    }

    /// Whether `get_logger(name)` would return an existing logger
    pub fn exists(&self, name: &str) -> bool {
        name.is_empty() || name == "root" || self.shared.loggers.read().contains_key(name)
    }

    /// Names of all non-root loggers, sorted
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.loggers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every record at or below `level`, whatever the logger levels say
    pub fn disable(&self, level: LogLevel) {
        *self.shared.disabled.write() = Some(level);
    }

    pub fn enable_all(&self) {
        *self.shared.disabled.write() = None;
    }

    pub fn disabled_level(&self) -> Option<LogLevel> {
        *self.shared.disabled.read()
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.shared.metrics
    }

    /// Every distinct handler attached anywhere in the hierarchy
    pub fn all_handlers(&self) -> Vec<SharedHandler> {
        let mut seen: Vec<SharedHandler> = Vec::new();
        let loggers: Vec<Arc<Logger>> = std::iter::once(self.root())
            .chain(self.shared.loggers.read().values().cloned())
            .collect();
        for logger in loggers {
            for handler in logger.handlers() {
                if !seen.iter().any(|h| Arc::ptr_eq(h, &handler)) {
                    seen.push(handler);
                }
            }
        }
        seen
    }

    /// Flush every attached handler; failures go to `handle_error`-style reports
    pub fn flush_all(&self) {
        for handler in self.all_handlers() {
            let mut guard = handler.lock();
            if let Err(e) = guard.flush() {
                super::diagnostics::report(&format!(
                    "[LOGGER ERROR] Handler '{}' flush failed: {}",
                    guard.name(),
                    e
                ));
            }
        }
    }

    /// Flush and close every attached handler
    pub fn shutdown(&self) {
        for handler in self.all_handlers() {
            let mut guard = handler.lock();
            let _ = guard.flush();
            guard.close();
        }
    }
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("loggers", &self.shared.loggers.read().len())
            .field("disabled", &self.disabled_level())
            .finish()
    }
}

/// Process-wide registry, created on first use
pub fn global() -> &'static LoggerRegistry {
    static GLOBAL: OnceLock<LoggerRegistry> = OnceLock::new();
    GLOBAL.get_or_init(LoggerRegistry::new)
}

/// Logger `name` from the process-wide registry
pub fn get_logger(name: &str) -> Arc<Logger> {
    global().get_logger(name)
}
