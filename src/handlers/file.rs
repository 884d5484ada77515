//! Plain file handler and the file stream shared by the rotating variants

use crate::core::{Handler, HandlerCore, LoggerError, Record, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// How the log file is opened the first time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    #[default]
    Append,
    /// Truncate on first open; later reopens append
    Truncate,
}

/// Options for [`FileHandler`]
///
/// # Examples
///
/// ```
/// use rust_log_dispatch::handlers::{FileMode, FileOptions};
///
/// let options = FileOptions::new().with_mode(FileMode::Truncate).with_delay(true);
/// assert!(options.delay);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOptions {
    pub mode: FileMode,
    /// Open the file on first emit instead of at construction
    pub delay: bool,
}

impl FileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: bool) -> Self {
        self.delay = delay;
        self
    }
}

/// Lazily opened, size-tracking line writer over one path
#[derive(Debug)]
pub struct FileTarget {
    path: PathBuf,
    mode: FileMode,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    opened_once: bool,
}

impl FileTarget {
    pub fn new(path: impl Into<PathBuf>, mode: FileMode) -> Self {
        Self {
            path: path.into(),
            mode,
            writer: None,
            current_size: 0,
            opened_once: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn open(&mut self) -> Result<()> {
        let truncate = self.mode == FileMode::Truncate && !self.opened_once;
        self.open_with(truncate)
    }

    /// Open the base path, emptying it first
    pub fn open_truncated(&mut self) -> Result<()> {
        self.open_with(true)
    }

    pub fn ensure_open(&mut self) -> Result<()> {
        if self.writer.is_none() {
            self.open()?;
        }
        Ok(())
    }

    fn open_with(&mut self, truncate: bool) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LoggerError::io_operation(
                        "create log directory",
                        format!("Failed to create directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(&self.path).map_err(|e| {
            LoggerError::file_handler(
                self.path.display().to_string(),
                format!("Failed to open: {}", e),
            )
        })?;

        let metadata = file.metadata().map_err(|e| {
            LoggerError::file_handler(
                self.path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?;

        self.current_size = metadata.len();
        self.writer = Some(BufWriter::new(file));
        self.opened_once = true;
        Ok(())
    }

    /// Write `line` plus a newline and push it to the file
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.ensure_open()?;
        let writer = self.writer.as_mut().ok_or_else(|| {
            LoggerError::file_handler(self.path.display().to_string(), "File not open")
        })?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        self.current_size += line.len() as u64 + 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush and release the file; a second call does nothing
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::io_operation(
                    "close log file",
                    format!("Failed to flush '{}'", self.path.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

impl Drop for FileTarget {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Appends formatted records to a file
///
/// Closing releases the file; a later emit opens it again.
///
/// # Examples
///
/// ```no_run
/// use rust_log_dispatch::handlers::FileHandler;
/// use rust_log_dispatch::prelude::*;
///
/// let handler = FileHandler::new("/var/log/app.log")
///     .unwrap()
///     .with_level(LogLevel::Info);
/// ```
#[derive(Debug)]
pub struct FileHandler {
    core: HandlerCore,
    target: FileTarget,
}

impl FileHandler {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(path, FileOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: FileOptions) -> Result<Self> {
        let mut target = FileTarget::new(path, options.mode);
        if !options.delay {
            target.open()?;
        }
        Ok(Self {
            core: HandlerCore::new(),
            target,
        })
    }

    pub fn path(&self) -> &Path {
        self.target.path()
    }

    pub fn is_open(&self) -> bool {
        self.target.is_open()
    }
}

impl Handler for FileHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn emit(&mut self, record: &Record) -> Result<()> {
        let line = self.core.format(record)?;
        self.target.write_line(&line)
    }

    fn flush(&mut self) -> Result<()> {
        self.target.flush()
    }

    fn close(&mut self) {
        if let Err(e) = self.target.close() {
            crate::core::diagnostics::report(&format!("[LOGGER ERROR] {}", e));
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use crate::format::Formatter;
    use tempfile::TempDir;

    fn record(msg: &str) -> Record {
        Record::new("app", LogLevel::Info, msg)
    }

    #[test]
    fn test_writes_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut handler = FileHandler::new(&path)
            .unwrap()
            .with_formatter(Formatter::new("%(levelname)s %(message)s"));

        handler.handle(&record("one"));
        handler.handle(&record("two"));

        assert_eq!(fs::read_to_string(&path).unwrap(), "INFO one\nINFO two\n");
    }

    #[test]
    fn test_append_and_truncate_modes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mode.log");
        fs::write(&path, "old\n").unwrap();

        let mut appending = FileHandler::new(&path)
            .unwrap()
            .with_formatter(Formatter::new("%(message)s"));
        appending.handle(&record("new"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");
        appending.close();

        let mut truncating =
            FileHandler::with_options(&path, FileOptions::new().with_mode(FileMode::Truncate))
                .unwrap()
                .with_formatter(Formatter::new("%(message)s"));
        truncating.handle(&record("fresh"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_delayed_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("delayed.log");
        let mut handler =
            FileHandler::with_options(&path, FileOptions::new().with_delay(true)).unwrap();

        assert!(!path.exists());
        assert!(!handler.is_open());
        handler.handle(&record("first"));
        assert!(path.exists());
        assert!(handler.is_open());
    }

    #[test]
    fn test_close_is_idempotent_and_reopens_on_emit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reopen.log");
        let mut handler = FileHandler::new(&path)
            .unwrap()
            .with_formatter(Formatter::new("%(message)s"));

        handler.handle(&record("before"));
        handler.close();
        handler.close();
        assert!(!handler.is_open());

        handler.handle(&record("after"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "before\nafter\n");
    }

    #[test]
    fn test_target_tracks_size() {
        let dir = TempDir::new().unwrap();
        let mut target = FileTarget::new(dir.path().join("size.log"), FileMode::Append);
        target.write_line("12345").unwrap();
        assert_eq!(target.current_size(), 6);
        target.close().unwrap();
        target.open().unwrap();
        assert_eq!(target.current_size(), 6);
        target.open_truncated().unwrap();
        assert_eq!(target.current_size(), 0);
    }
}
