//! Assembly of a [`LoggingConfig`] into a registry

use super::{FilterConfig, FormatterConfig, HandlerConfig, HandlerKind, LoggerConfig, LoggingConfig};
use crate::core::{
    shared, Filter, FilterChain, Handler, Logger, LoggerError, LoggerRegistry, NullHandler,
    Result, SharedHandler,
};
use crate::format::{Formatter, InterpolatorKind, DEFAULT_BRACE_FORMAT, DEFAULT_FORMAT};
use crate::handlers::{
    Backoff, FileHandler, FileOptions, RotatingFileHandler, RotationPolicy, SocketHandler,
    StreamHandler, SyslogAddress, SyslogHandler, TimedRotatingFileHandler, TimedRotationPolicy,
    WatchedFileHandler, When,
};
use std::collections::HashMap;
use std::time::Duration;

impl LoggingConfig {
    /// Check references and handler arguments without side effects
    pub fn validate(&self) -> Result<()> {
        for (name, handler) in &self.handlers {
            if let Some(formatter) = &handler.formatter {
                if !self.formatters.contains_key(formatter) {
                    return Err(LoggerError::config(
                        format!("handler '{}'", name),
                        format!("unknown formatter '{}'", formatter),
                    ));
                }
            }
            validate_kind(name, &handler.kind)?;
        }

        let loggers = self
            .loggers
            .iter()
            .map(|(name, cfg)| (name.as_str(), cfg))
            .chain(self.root.iter().map(|cfg| ("root", cfg)));
        for (name, logger) in loggers {
            for handler in &logger.handlers {
                if !self.handlers.contains_key(handler) {
                    return Err(LoggerError::config(
                        format!("logger '{}'", name),
                        format!("unknown handler '{}'", handler),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Build formatters and handlers, then configure the loggers.
    ///
    /// Each configured logger gets its level, propagation flag and filters
    /// set and its handler list replaced. Loggers not mentioned are left
    /// alone. Nothing in `registry` changes if any step before logger
    /// configuration fails.
    pub fn apply(&self, registry: &LoggerRegistry) -> Result<()> {
        self.validate()?;

        let formatters: HashMap<&str, Formatter> = self
            .formatters
            .iter()
            .map(|(name, cfg)| (name.as_str(), build_formatter(cfg)))
            .collect();

        let mut handlers: HashMap<&str, SharedHandler> = HashMap::new();
        for (name, cfg) in &self.handlers {
            let formatter = cfg
                .formatter
                .as_deref()
                .and_then(|f| formatters.get(f))
                .cloned();
            handlers.insert(name.as_str(), build_handler(name, cfg, formatter)?);
        }

        if let Some(root) = &self.root {
            configure_logger(&registry.root(), root, &handlers);
        }
        for (name, cfg) in &self.loggers {
            configure_logger(&registry.get_logger(name), cfg, &handlers);
        }
        Ok(())
    }
}

fn validate_kind(name: &str, kind: &HandlerKind) -> Result<()> {
    let component = format!("handler '{}'", name);
    match kind {
        HandlerKind::TimedRotatingFile { when, interval, .. } => {
            let when: When = when
                .parse()
                .map_err(|e: LoggerError| LoggerError::config(&component, e.to_string()))?;
            TimedRotationPolicy::new(when)
                .with_interval(*interval)
                .validate()
                .map_err(|e| LoggerError::config(&component, e.to_string()))
        }
        HandlerKind::Socket { host, port, retry_factor, .. } => {
            if host.is_empty() || *port == 0 {
                return Err(LoggerError::config(component, "host and non-zero port required"));
            }
            if matches!(retry_factor, Some(f) if f.is_nan() || *f < 1.0) {
                return Err(LoggerError::config(component, "retry_factor must be at least 1"));
            }
            Ok(())
        }
        HandlerKind::Syslog {
            address,
            socket_path,
            ..
        } => {
            if address.is_some() && socket_path.is_some() {
                return Err(LoggerError::config(
                    component,
                    "give either address or socket_path, not both",
                ));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn build_formatter(cfg: &FormatterConfig) -> Formatter {
    let format = cfg.format.clone().unwrap_or_else(|| {
        match cfg.style {
            InterpolatorKind::Percent => DEFAULT_FORMAT,
            InterpolatorKind::Brace => DEFAULT_BRACE_FORMAT,
        }
        .to_string()
    });
    let mut formatter = Formatter::new(format)
        .with_style(cfg.style)
        .with_local_time(cfg.local_time);
    if let Some(date_format) = &cfg.date_format {
        formatter = formatter.with_time_format(date_format);
    }
    formatter
}

fn build_filter(cfg: &FilterConfig) -> Filter {
    match cfg {
        FilterConfig::Level(level) => Filter::level(*level),
        FilterConfig::Name(prefix) => Filter::name(prefix.clone()),
        FilterConfig::Not(inner) => build_filter(inner).negate(),
    }
}

fn build_filters(cfgs: &[FilterConfig]) -> FilterChain {
    cfgs.iter().map(build_filter).collect()
}

/// Apply the settings shared by every handler class
fn finish<H: Handler + 'static>(
    mut handler: H,
    cfg: &HandlerConfig,
    formatter: Option<Formatter>,
) -> SharedHandler {
    let core = handler.core_mut();
    if let Some(level) = cfg.level {
        core.set_level(level);
    }
    if let Some(formatter) = formatter {
        core.set_formatter(formatter);
    }
    core.set_filters(build_filters(&cfg.filters));
    shared(handler)
}

fn build_handler(
    name: &str,
    cfg: &HandlerConfig,
    formatter: Option<Formatter>,
) -> Result<SharedHandler> {
    let opening = |e: LoggerError| LoggerError::config(format!("handler '{}'", name), e.to_string());

    let handler = match &cfg.kind {
        HandlerKind::Stream { stream, colors } => finish(
            StreamHandler::new(*stream).with_colors(*colors),
            cfg,
            formatter,
        ),
        HandlerKind::Null => finish(NullHandler::new(), cfg, formatter),
        HandlerKind::File { path, mode, delay } => {
            let options = FileOptions::new().with_mode(*mode).with_delay(*delay);
            finish(
                FileHandler::with_options(path, options).map_err(opening)?,
                cfg,
                formatter,
            )
        }
        HandlerKind::RotatingFile {
            path,
            max_bytes,
            backup_count,
            delay,
        } => {
            let policy = RotationPolicy::new()
                .with_max_bytes(*max_bytes)
                .with_backup_count(*backup_count)
                .with_delay(*delay);
            finish(
                RotatingFileHandler::with_policy(path, policy).map_err(opening)?,
                cfg,
                formatter,
            )
        }
        HandlerKind::TimedRotatingFile {
            path,
            when,
            interval,
            backup_count,
            utc,
            at_time,
            delay,
        } => {
            let mut policy = TimedRotationPolicy::new(when.parse().map_err(opening)?)
                .with_interval(*interval)
                .with_backup_count(*backup_count)
                .with_utc(*utc)
                .with_delay(*delay);
            if let Some(at) = at_time {
                policy = policy.with_at_time(*at);
            }
            finish(
                TimedRotatingFileHandler::with_policy(path, policy).map_err(opening)?,
                cfg,
                formatter,
            )
        }
        HandlerKind::WatchedFile { path, delay } => {
            let handler = if *delay {
                WatchedFileHandler::delayed(path)
            } else {
                WatchedFileHandler::new(path).map_err(opening)?
            };
            finish(handler, cfg, formatter)
        }
        HandlerKind::Socket {
            host,
            port,
            connect_timeout_ms,
            close_on_error,
            retry_start_ms,
            retry_factor,
            retry_max_ms,
        } => {
            let backoff = Backoff::new(
                retry_start_ms.map_or(Duration::from_secs(1), Duration::from_millis),
                retry_factor.unwrap_or(2.0),
                retry_max_ms.map_or(Duration::from_secs(30), Duration::from_millis),
            );
            let mut handler = SocketHandler::new(format!("{}:{}", host, port))
                .with_backoff(backoff)
                .with_close_on_error(*close_on_error);
            if let Some(ms) = connect_timeout_ms {
                handler = handler.with_connect_timeout(Duration::from_millis(*ms));
            }
            finish(handler, cfg, formatter)
        }
        HandlerKind::Syslog {
            address,
            socket_path,
            facility,
            ident,
            append_nul,
        } => {
            let address = match (address, socket_path) {
                (_, Some(path)) => SyslogAddress::Unix(path.clone()),
                (Some(addr), None) => SyslogAddress::Udp(addr.clone()),
                (None, None) => SyslogAddress::default(),
            };
            finish(
                SyslogHandler::new(address)
                    .with_facility(*facility)
                    .with_ident(ident.clone())
                    .with_append_nul(*append_nul),
                cfg,
                formatter,
            )
        }
    };
    Ok(handler)
}

fn configure_logger(logger: &Logger, cfg: &LoggerConfig, handlers: &HashMap<&str, SharedHandler>) {
    match cfg.level {
        Some(level) => logger.set_level(level),
        None => logger.clear_level(),
    }
    if let Some(propagate) = cfg.propagate {
        logger.set_propagate(propagate);
    }
    logger.set_filters(build_filters(&cfg.filters));
    logger.clear_handlers();
    for name in &cfg.handlers {
        if let Some(handler) = handlers.get(name.as_str()) {
            logger.add_handler(std::sync::Arc::clone(handler));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_apply_wires_shared_handlers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let config = LoggingConfig::new()
            .with_formatter(
                "short",
                FormatterConfig {
                    format: Some("%(name)s %(levelname)s %(message)s".to_string()),
                    ..FormatterConfig::default()
                },
            )
            .with_handler(
                "file",
                HandlerConfig::new(HandlerKind::File {
                    path: path.clone(),
                    mode: Default::default(),
                    delay: false,
                })
                .with_formatter("short")
                .with_filter(FilterConfig::Not(Box::new(FilterConfig::Name("app.noisy".into())))),
            )
            .with_logger("app", LoggerConfig::new().with_level(LogLevel::Info).with_handler("file"))
            .with_logger("app.db", LoggerConfig::new().with_handler("file").with_propagate(false));

        let registry = LoggerRegistry::new();
        config.apply(&registry).unwrap();

        let db = registry.get_logger("app.db");
        let app = registry.get_logger("app");
        assert!(std::sync::Arc::ptr_eq(&db.handlers()[0], &app.handlers()[0]));
        assert_eq!(db.effective_level(), LogLevel::Info);

        app.info("started");
        db.warn("slow query");
        registry.get_logger("app.noisy").info("hidden");
        registry.get_logger("app.web").debug("below level");

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "app INFO started\napp.db WARN slow query\n"
        );
    }

    #[test]
    fn test_unknown_handler_reference_leaves_registry_untouched() {
        let config = LoggingConfig::new()
            .with_handler("null", HandlerConfig::new(HandlerKind::Null))
            .with_root(LoggerConfig::new().with_level(LogLevel::Trace).with_handler("null"))
            .with_logger("svc", LoggerConfig::new().with_handler("missing"));

        let registry = LoggerRegistry::new();
        let err = config.apply(&registry).unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(registry.root().level(), Some(crate::core::DEFAULT_ROOT_LEVEL));
        assert!(!registry.root().has_handlers());
        assert!(!registry.exists("svc"));
    }

    #[test]
    fn test_unknown_formatter_reference() {
        let config = LoggingConfig::new()
            .with_handler("null", HandlerConfig::new(HandlerKind::Null).with_formatter("nope"));
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_invalid_rollover_unit() {
        let config = LoggingConfig::new().with_handler(
            "timed",
            HandlerConfig::new(HandlerKind::TimedRotatingFile {
                path: "t.log".into(),
                when: "W9".to_string(),
                interval: 1,
                backup_count: 0,
                utc: false,
                at_time: None,
                delay: true,
            }),
        );
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_brace_formatter_default_template() {
        let formatter = build_formatter(&FormatterConfig {
            style: InterpolatorKind::Brace,
            ..FormatterConfig::default()
        });
        assert_eq!(formatter.format_template(), DEFAULT_BRACE_FORMAT);
    }
}
