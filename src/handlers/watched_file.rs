//! File handler that follows external rotation
//!
//! Tools like `logrotate` move or delete the log file behind the process's
//! back. Before every write this handler compares the device and inode of the
//! path with those of the file it holds open and reopens the path when they
//! differ or the file is gone.

use super::file::{FileMode, FileTarget};
use crate::core::{Handler, HandlerCore, Record, Result};
use std::path::{Path, PathBuf};

/// Device and inode of a file
type FileIdentity = (u64, u64);

#[cfg(unix)]
fn file_identity(path: &Path) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path).ok().map(|m| (m.dev(), m.ino()))
}

// Without inode numbers only disappearance of the file can be detected
#[cfg(not(unix))]
fn file_identity(path: &Path) -> Option<FileIdentity> {
    std::fs::metadata(path).ok().map(|_| (0, 0))
}

#[derive(Debug)]
pub struct WatchedFileHandler {
    core: HandlerCore,
    target: FileTarget,
    identity: Option<FileIdentity>,
}

impl WatchedFileHandler {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let mut handler = Self {
            core: HandlerCore::new(),
            target: FileTarget::new(path, FileMode::Append),
            identity: None,
        };
        handler.open()?;
        Ok(handler)
    }

    /// Lazy variant: the file is opened by the first emit
    pub fn delayed(path: impl Into<PathBuf>) -> Self {
        Self {
            core: HandlerCore::new(),
            target: FileTarget::new(path, FileMode::Append),
            identity: None,
        }
    }

    pub fn path(&self) -> &Path {
        self.target.path()
    }

    fn open(&mut self) -> Result<()> {
        self.target.open()?;
        self.identity = file_identity(self.target.path());
        Ok(())
    }

    /// Reopen when the path no longer refers to the open file
    pub fn reopen_if_needed(&mut self) -> Result<()> {
        let current = file_identity(self.target.path());
        if self.target.is_open() && current.is_some() && current == self.identity {
            return Ok(());
        }
        self.target.close()?;
        self.open()
    }
}

impl Handler for WatchedFileHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn emit(&mut self, record: &Record) -> Result<()> {
        let line = self.core.format(record)?;
        self.reopen_if_needed()?;
        self.target.write_line(&line)
    }

    fn flush(&mut self) -> Result<()> {
        self.target.flush()
    }

    fn close(&mut self) {
        if let Err(e) = self.target.close() {
            crate::core::diagnostics::report(&format!("[LOGGER ERROR] {}", e));
        }
        self.identity = None;
    }

    fn name(&self) -> &str {
        "watched_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use crate::format::Formatter;
    use std::fs;
    use tempfile::TempDir;

    fn record(msg: &str) -> Record {
        Record::new("app", LogLevel::Info, msg)
    }

    #[test]
    fn test_reopens_after_removal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watched.log");
        let mut handler = WatchedFileHandler::new(&path)
            .unwrap()
            .with_formatter(Formatter::new("%(message)s"));

        handler.handle(&record("first"));
        fs::remove_file(&path).unwrap();
        handler.handle(&record("second"));

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_reopens_after_external_rename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watched.log");
        let moved = dir.path().join("watched.log.1");
        let mut handler = WatchedFileHandler::new(&path)
            .unwrap()
            .with_formatter(Formatter::new("%(message)s"));

        handler.handle(&record("before rotate"));
        fs::rename(&path, &moved).unwrap();
        fs::write(&path, "").unwrap();
        handler.handle(&record("after rotate"));

        assert_eq!(fs::read_to_string(&moved).unwrap(), "before rotate\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "after rotate\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_reopens_after_replacement_under_same_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watched.log");
        let staged = dir.path().join("staged.tmp");
        let mut handler = WatchedFileHandler::new(&path)
            .unwrap()
            .with_formatter(Formatter::new("%(message)s"));

        handler.handle(&record("old inode"));
        let before = file_identity(&path);

        fs::write(&staged, "replaced\n").unwrap();
        fs::rename(&staged, &path).unwrap();
        assert_ne!(file_identity(&path), before);

        handler.handle(&record("new inode"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "replaced\nnew inode\n");
        assert_eq!(handler.identity, file_identity(&path));
    }

    #[test]
    fn test_delayed_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lazy.log");
        let mut handler = WatchedFileHandler::delayed(&path);
        assert!(!path.exists());
        handler.handle(&record("x"));
        assert!(path.exists());
    }
}
