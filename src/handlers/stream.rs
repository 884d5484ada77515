//! Stream handler writing to stdout, stderr or any writer

use crate::core::{Handler, HandlerCore, Record, Result};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Standard stream to write to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTarget {
    Stdout,
    #[default]
    Stderr,
}

enum Sink {
    Std(StreamTarget),
    Writer(Box<dyn Write + Send>),
}

/// Writes formatted records, one per line
///
/// # Example
///
/// ```
/// use rust_log_dispatch::handlers::{StreamHandler, StreamTarget};
///
/// let handler = StreamHandler::new(StreamTarget::Stdout).with_colors(false);
/// ```
pub struct StreamHandler {
    core: HandlerCore,
    sink: Sink,
    use_colors: bool,
}

impl StreamHandler {
    pub fn new(target: StreamTarget) -> Self {
        Self {
            core: HandlerCore::new(),
            sink: Sink::Std(target),
            use_colors: false,
        }
    }

    pub fn stdout() -> Self {
        Self::new(StreamTarget::Stdout)
    }

    pub fn stderr() -> Self {
        Self::new(StreamTarget::Stderr)
    }

    /// Handler writing into an arbitrary writer
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            core: HandlerCore::new(),
            sink: Sink::Writer(Box::new(writer)),
            use_colors: false,
        }
    }

    /// Color the whole line by level (feature `console`)
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    #[cfg(feature = "console")]
    fn decorate(&self, record: &Record, line: String) -> String {
        use colored::Colorize;
        if self.use_colors {
            line.color(record.level.color_code()).to_string()
        } else {
            line
        }
    }

    #[cfg(not(feature = "console"))]
    fn decorate(&self, _record: &Record, line: String) -> String {
        line
    }
}

impl Default for StreamHandler {
    fn default() -> Self {
        Self::stderr()
    }
}

impl std::fmt::Debug for StreamHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = match &self.sink {
            Sink::Std(StreamTarget::Stdout) => "stdout",
            Sink::Std(StreamTarget::Stderr) => "stderr",
            Sink::Writer(_) => "writer",
        };
        f.debug_struct("StreamHandler")
            .field("target", &target)
            .field("use_colors", &self.use_colors)
            .finish()
    }
}

impl Handler for StreamHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn emit(&mut self, record: &Record) -> Result<()> {
        let line = self.core.format(record)?;
        let line = self.decorate(record, line);
        match &mut self.sink {
            Sink::Std(StreamTarget::Stdout) => {
                let mut out = io::stdout().lock();
                writeln!(out, "{}", line)?;
                out.flush()?;
            }
            Sink::Std(StreamTarget::Stderr) => {
                let mut err = io::stderr().lock();
                writeln!(err, "{}", line)?;
                err.flush()?;
            }
            Sink::Writer(writer) => {
                writeln!(writer, "{}", line)?;
                writer.flush()?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Std(StreamTarget::Stdout) => io::stdout().flush()?,
            Sink::Std(StreamTarget::Stderr) => io::stderr().flush()?,
            Sink::Writer(writer) => writer.flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogLevel, LoggerError};
    use crate::format::Formatter;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_to_writer() {
        let buf = SharedBuf::default();
        let mut handler = StreamHandler::from_writer(buf.clone())
            .with_formatter(Formatter::new("%(levelname)s:%(message)s"));

        handler.handle(&Record::new("a", LogLevel::Info, "hi"));
        handler.handle(&Record::new("a", LogLevel::Error, "bad"));

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        assert_eq!(text, "INFO:hi\nERROR:bad\n");
    }

    #[test]
    fn test_write_failure_is_absorbed() {
        struct CountingErrors {
            inner: StreamHandler,
            errors: usize,
        }

        impl Handler for CountingErrors {
            fn core(&self) -> &HandlerCore {
                self.inner.core()
            }

            fn core_mut(&mut self) -> &mut HandlerCore {
                self.inner.core_mut()
            }

            fn emit(&mut self, record: &Record) -> Result<()> {
                self.inner.emit(record)
            }

            fn name(&self) -> &str {
                "counting"
            }

            fn handle_error(&mut self, _record: &Record, _error: &LoggerError) {
                self.errors += 1;
            }
        }

        let mut handler = CountingErrors {
            inner: StreamHandler::from_writer(BrokenPipe),
            errors: 0,
        };
        handler.handle(&Record::new("a", LogLevel::Warn, "lost"));
        assert_eq!(handler.errors, 1);
    }

    #[cfg(feature = "console")]
    #[test]
    fn test_colors_toggle() {
        colored::control::set_override(true);
        let buf = SharedBuf::default();
        let mut handler = StreamHandler::from_writer(buf.clone())
            .with_formatter(Formatter::new("%(message)s"))
            .with_colors(true);
        handler.handle(&Record::new("a", LogLevel::Error, "red"));

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        assert!(text.contains("\u{1b}["));
        assert!(text.contains("red"));
    }
}
