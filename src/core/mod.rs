//! Core logging types: records, levels, filters, handlers and the logger hierarchy

pub mod args;
pub mod diagnostics;
pub mod error;
pub mod exception;
pub mod filter;
pub mod handler;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod record;
pub mod registry;

pub use args::{FieldValue, LogArgs};
pub use error::{LoggerError, Result};
pub use exception::{ExceptionInfo, StackFrame};
pub use filter::{Filter, FilterChain};
pub use handler::{shared, HandleOutcome, Handler, HandlerCore, NullHandler, SharedHandler};
pub use log_level::LogLevel;
pub use logger::{Logger, DEFAULT_ROOT_LEVEL};
pub use metrics::LoggerMetrics;
pub use record::Record;
pub use registry::{get_logger, global, LoggerRegistry};
