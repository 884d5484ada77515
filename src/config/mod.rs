//! Declarative logging configuration
//!
//! A [`LoggingConfig`] describes formatters, handlers and loggers by name and
//! is usually read from JSON:
//!
//! ```
//! use rust_log_dispatch::config::LoggingConfig;
//! use rust_log_dispatch::{LoggerRegistry, LogLevel};
//!
//! let config = LoggingConfig::from_json_str(r#"{
//!     "formatters": { "plain": { "format": "%(levelname)s %(name)s: %(message)s" } },
//!     "handlers": {
//!         "console": { "class": "stream", "stream": "stdout", "formatter": "plain" },
//!         "quiet": { "class": "null", "level": "ERROR" }
//!     },
//!     "loggers": {
//!         "app.db": { "level": "DEBUG", "handlers": ["quiet"], "propagate": false }
//!     },
//!     "root": { "level": "INFO", "handlers": ["console"] }
//! }"#).unwrap();
//!
//! let registry = LoggerRegistry::new();
//! config.apply(&registry).unwrap();
//! assert_eq!(registry.get_logger("app.db").level(), Some(LogLevel::Debug));
//! ```
//!
//! [`LoggingConfig::apply`] checks every reference and handler argument before
//! it touches the registry, so a bad configuration leaves it unchanged.

mod builder;

use crate::core::{LogLevel, LoggerError, Result};
use crate::format::InterpolatorKind;
use crate::handlers::{Facility, FileMode, StreamTarget};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Whole logging setup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub formatters: BTreeMap<String, FormatterConfig>,
    #[serde(default)]
    pub handlers: BTreeMap<String, HandlerConfig>,
    #[serde(default)]
    pub loggers: BTreeMap<String, LoggerConfig>,
    #[serde(default)]
    pub root: Option<LoggerConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatterConfig {
    /// Output template; the style's default when absent
    #[serde(default)]
    pub format: Option<String>,
    /// strftime-like pattern for `asctime`
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub style: InterpolatorKind,
    #[serde(default)]
    pub local_time: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(flatten)]
    pub kind: HandlerKind,
    /// Name of an entry in `formatters`
    #[serde(default)]
    pub formatter: Option<String>,
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

fn default_true() -> bool {
    true
}

/// Handler class and its constructor arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum HandlerKind {
    Stream {
        #[serde(default)]
        stream: StreamTarget,
        #[serde(default)]
        colors: bool,
    },
    Null,
    File {
        path: PathBuf,
        #[serde(default)]
        mode: FileMode,
        #[serde(default)]
        delay: bool,
    },
    RotatingFile {
        path: PathBuf,
        #[serde(default)]
        max_bytes: u64,
        #[serde(default)]
        backup_count: usize,
        #[serde(default)]
        delay: bool,
    },
    TimedRotatingFile {
        path: PathBuf,
        /// `S`, `M`, `H`, `D`, `midnight` or `W0`..`W6`
        when: String,
        #[serde(default = "default_interval")]
        interval: u32,
        #[serde(default)]
        backup_count: usize,
        #[serde(default)]
        utc: bool,
        #[serde(default)]
        at_time: Option<NaiveTime>,
        #[serde(default)]
        delay: bool,
    },
    WatchedFile {
        path: PathBuf,
        #[serde(default)]
        delay: bool,
    },
    Socket {
        host: String,
        port: u16,
        #[serde(default)]
        connect_timeout_ms: Option<u64>,
        #[serde(default)]
        close_on_error: bool,
        #[serde(default)]
        retry_start_ms: Option<u64>,
        #[serde(default)]
        retry_factor: Option<f64>,
        #[serde(default)]
        retry_max_ms: Option<u64>,
    },
    Syslog {
        /// `host:port` for UDP delivery
        #[serde(default)]
        address: Option<String>,
        /// Unix datagram socket such as `/dev/log`
        #[serde(default)]
        socket_path: Option<PathBuf>,
        #[serde(default)]
        facility: Facility,
        #[serde(default)]
        ident: String,
        #[serde(default = "default_true")]
        append_nul: bool,
    },
}

fn default_interval() -> u32 {
    1
}

/// Filter description; `{"not": {"level": "WARN"}}` negates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterConfig {
    Level(LogLevel),
    Name(String),
    Not(Box<FilterConfig>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub level: Option<LogLevel>,
    /// Names of entries in `handlers`; replaces the logger's handler list
    #[serde(default)]
    pub handlers: Vec<String>,
    #[serde(default)]
    pub propagate: Option<bool>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; malformed input and unknown handler classes
    /// are configuration errors
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LoggerError::config("logging", e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "read logging configuration",
                format!("Failed to read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&text)
    }

    #[must_use]
    pub fn with_formatter(mut self, name: impl Into<String>, formatter: FormatterConfig) -> Self {
        self.formatters.insert(name.into(), formatter);
        self
    }

    #[must_use]
    pub fn with_handler(mut self, name: impl Into<String>, handler: HandlerConfig) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    #[must_use]
    pub fn with_logger(mut self, name: impl Into<String>, logger: LoggerConfig) -> Self {
        self.loggers.insert(name.into(), logger);
        self
    }

    #[must_use]
    pub fn with_root(mut self, root: LoggerConfig) -> Self {
        self.root = Some(root);
        self
    }
}

impl HandlerConfig {
    pub fn new(kind: HandlerKind) -> Self {
        Self {
            kind,
            formatter: None,
            level: None,
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_formatter(mut self, name: impl Into<String>) -> Self {
        self.formatter = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filters.push(filter);
        self
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn with_handler(mut self, name: impl Into<String>) -> Self {
        self.handlers.push(name.into());
        self
    }

    #[must_use]
    pub fn with_propagate(mut self, propagate: bool) -> Self {
        self.propagate = Some(propagate);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filters.push(filter);
        self
    }
}
