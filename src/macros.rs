//! Logging macros with named arguments.
//!
//! Arguments are given as `key = value` pairs and substituted into the
//! template by the handler's formatter. They are only evaluated when the
//! logger is enabled for the level.
//!
//! # Examples
//!
//! ```
//! use rust_log_dispatch::prelude::*;
//! use rust_log_dispatch::info;
//!
//! let registry = LoggerRegistry::new();
//! let logger = registry.get_logger("server");
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Listening on port %(port)d", port = port);
//! ```

/// Build [`LogArgs`](crate::LogArgs) from `key => value` pairs.
///
/// # Examples
///
/// ```
/// use rust_log_dispatch::args;
///
/// let args = args! { "user" => "ada", "attempts" => 3 };
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::LogArgs::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::LogArgs::new()$(.with_field($key, $value))+
    };
}

/// Log at an explicit level.
///
/// # Examples
///
/// ```
/// # use rust_log_dispatch::prelude::*;
/// # let registry = LoggerRegistry::new();
/// # let logger = registry.get_logger("app");
/// use rust_log_dispatch::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: %(code)d", code = 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $template:expr $(,)?) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled_for(level) {
            logger.log(level, $template, $crate::LogArgs::new());
        }
    }};
    ($logger:expr, $level:expr, $template:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled_for(level) {
            logger.log(
                level,
                $template,
                $crate::LogArgs::new()$(.with_field(stringify!($key), $value))+,
            );
        }
    }};
}

/// Log a trace-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_dispatch::prelude::*;
/// # let registry = LoggerRegistry::new();
/// # let logger = registry.get_logger("app");
/// # logger.set_level(LogLevel::Trace);
/// use rust_log_dispatch::trace;
/// trace!(logger, "Entering calculate()");
/// trace!(logger, "Variable value: %(value)s", value = 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_dispatch::prelude::*;
/// # let registry = LoggerRegistry::new();
/// # let logger = registry.get_logger("app");
/// use rust_log_dispatch::info;
/// info!(logger, "Processing %(count)d items", count = 100);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_dispatch::prelude::*;
/// # let registry = LoggerRegistry::new();
/// # let logger = registry.get_logger("app");
/// use rust_log_dispatch::error;
/// error!(logger, "Failed to connect to %(host)s", host = "db-1");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}
