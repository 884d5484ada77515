//! # Rust Log Dispatch
//!
//! Hierarchical logging with pluggable formatting and sinks.
//!
//! ## Features
//!
//! - **Logger hierarchy**: dotted names, inherited levels and propagation to ancestors
//! - **Named arguments**: percent (`%(user)s`) or brace (`{user}`) templates
//! - **Handlers**: stream, file, size and time rotation, watched file, TCP socket, syslog
//! - **Fail-safe**: sink failures are reported on a fallback stream, never to the caller
//! - **Declarative setup**: typed JSON configuration validated before it is applied
//!
//! ```
//! use rust_log_dispatch::prelude::*;
//! use rust_log_dispatch::handlers::StreamHandler;
//!
//! let registry = LoggerRegistry::new();
//! registry.root().set_level(LogLevel::Info);
//! registry.root().add_handler(shared(StreamHandler::stderr()));
//!
//! let logger = registry.get_logger("app.db");
//! logger.log(LogLevel::Info, "pool ready with %(size)d connections", args! { "size" => 8 });
//! ```

pub mod config;
pub mod core;
pub mod format;
pub mod handlers;
pub mod macros;

pub mod prelude {
    pub use crate::args;
    pub use crate::core::{
        get_logger, shared, ExceptionInfo, FieldValue, Filter, FilterChain, HandleOutcome,
        Handler, HandlerCore, LogArgs, LogLevel, Logger, LoggerError, LoggerMetrics,
        LoggerRegistry, Record, Result, SharedHandler,
    };
    pub use crate::format::{Formatter, InterpolatorKind, TimestampFormat};
}

pub use crate::core::{
    diagnostics, get_logger, global, shared, ExceptionInfo, FieldValue, Filter, FilterChain,
    HandleOutcome, Handler, HandlerCore, LogArgs, LogLevel, Logger, LoggerError, LoggerMetrics,
    LoggerRegistry, NullHandler, Record, Result, SharedHandler, StackFrame,
};
pub use config::LoggingConfig;
pub use format::{Formatter, InterpolatorKind, TimestampFormat};
