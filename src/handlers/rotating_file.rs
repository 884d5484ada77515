//! Size-based rotating file handler
//!
//! Before a line is written, the handler checks whether the file would reach
//! `max_bytes` with it. If so, `base.N-1` moves to `base.N` down to
//! `base.1`, the base file becomes `base.1` and a fresh base file receives
//! the line.

use super::file::{FileMode, FileTarget};
use crate::core::{Handler, HandlerCore, LoggerError, Record, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// When and how far to rotate
///
/// # Examples
///
/// ```
/// use rust_log_dispatch::handlers::RotationPolicy;
///
/// let policy = RotationPolicy::new()
///     .with_max_bytes(50 * 1024 * 1024)
///     .with_backup_count(7);
/// assert_eq!(policy.backup_count, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size limit in bytes; `0` disables rotation
    pub max_bytes: u64,
    /// Number of numbered backups kept; `0` only truncates
    pub backup_count: usize,
    pub delay: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            backup_count: 5,
            delay: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_delay(mut self, delay: bool) -> Self {
        self.delay = delay;
        self
    }
}

/// File handler rotating on size
///
/// # Examples
///
/// ```no_run
/// use rust_log_dispatch::handlers::{RotatingFileHandler, RotationPolicy};
///
/// let policy = RotationPolicy::new().with_max_bytes(1024 * 1024).with_backup_count(3);
/// let handler = RotatingFileHandler::with_policy("/var/log/app.log", policy).unwrap();
/// ```
#[derive(Debug)]
pub struct RotatingFileHandler {
    core: HandlerCore,
    target: FileTarget,
    policy: RotationPolicy,
}

impl RotatingFileHandler {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    pub fn with_policy(path: impl Into<PathBuf>, policy: RotationPolicy) -> Result<Self> {
        let mut target = FileTarget::new(path, FileMode::Append);
        if !policy.delay {
            target.open()?;
        }
        Ok(Self {
            core: HandlerCore::new(),
            target,
            policy,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.target.path()
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.target.current_size()
    }

    /// Backup file path for given index
    fn backup_path(&self, index: usize) -> PathBuf {
        let base = self.target.path();
        let mut name = base.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}", index));
        base.with_file_name(name)
    }

    /// Whether writing `line` would reach the size limit
    pub fn should_rollover(&mut self, line: &str) -> Result<bool> {
        if self.policy.max_bytes == 0 {
            return Ok(false);
        }
        let base = self.target.path();
        if base.exists() && !base.is_file() {
            return Ok(false);
        }
        self.target.ensure_open()?;
        let projected = self.target.current_size() + line.len() as u64 + 1;
        Ok(projected >= self.policy.max_bytes)
    }

    /// Shift backups up by one and start an empty base file
    pub fn do_rollover(&mut self) -> Result<()> {
        self.target.close()?;

        if self.policy.backup_count > 0 {
            for i in (1..self.policy.backup_count).rev() {
                let src = self.backup_path(i);
                let dst = self.backup_path(i + 1);
                if src.exists() {
                    replace_file(&src, &dst)?;
                }
            }
            let first = self.backup_path(1);
            if self.target.path().exists() {
                replace_file(self.target.path(), &first)?;
            }
        }

        self.target.open_truncated()
    }
}

/// Rename `src` to `dst`, removing an existing `dst` first
fn replace_file(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        fs::remove_file(dst).map_err(|e| {
            LoggerError::file_rotation(
                dst.display().to_string(),
                format!("Failed to remove old backup: {}", e),
            )
        })?;
    }
    fs::rename(src, dst).map_err(|e| {
        LoggerError::file_rotation(
            src.display().to_string(),
            format!("Failed to rename to '{}': {}", dst.display(), e),
        )
    })
}

impl Handler for RotatingFileHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn emit(&mut self, record: &Record) -> Result<()> {
        let line = self.core.format(record)?;

        // A failed rollover is reported but the line is still written
        match self.should_rollover(&line) {
            Ok(true) => {
                if let Err(e) = self.do_rollover() {
                    self.handle_error(record, &e);
                }
            }
            Ok(false) => {}
            Err(e) => self.handle_error(record, &e),
        }

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
        "rotating_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HandleOutcome, LogLevel};
    use crate::format::Formatter;
    use tempfile::TempDir;

    fn handler(path: &Path, max_bytes: u64, backups: usize) -> RotatingFileHandler {
        let policy = RotationPolicy::new()
            .with_max_bytes(max_bytes)
            .with_backup_count(backups);
        RotatingFileHandler::with_policy(path, policy)
            .unwrap()
            .with_formatter(Formatter::new("%(message)s"))
    }

    fn line(n: usize) -> Record {
        Record::new("app", LogLevel::Info, format!("{:039}", n))
    }

    #[test]
    fn test_rotation_keeps_backup_count() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let mut handler = handler(&base, 100, 2);

        // 40 bytes per line: rollover on the 3rd, 5th, 7th and 9th line
        for i in 0..10 {
            handler.handle(&line(i));
        }

        assert!(base.exists());
        assert!(dir.path().join("app.log.1").exists());
        assert!(dir.path().join("app.log.2").exists());
        assert!(!dir.path().join("app.log.3").exists());
    }

    #[test]
    fn test_triggering_line_lands_in_new_file() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("edge.log");
        let mut handler = handler(&base, 100, 1);

        handler.handle(&line(0));
        handler.handle(&line(1));
        handler.handle(&line(2));

        let current = fs::read_to_string(&base).unwrap();
        let backup = fs::read_to_string(dir.path().join("edge.log.1")).unwrap();
        assert_eq!(current.lines().count(), 1);
        assert_eq!(current, format!("{:039}\n", 2));
        assert_eq!(backup.lines().count(), 2);
    }

    #[test]
    fn test_zero_backups_truncates() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("trunc.log");
        let mut handler = handler(&base, 50, 0);

        handler.handle(&line(0));
        handler.handle(&line(1));

        assert!(!dir.path().join("trunc.log.1").exists());
        assert_eq!(fs::read_to_string(&base).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_zero_max_bytes_never_rotates() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("never.log");
        let mut handler = handler(&base, 0, 3);

        for i in 0..20 {
            handler.handle(&line(i));
        }

        assert!(!dir.path().join("never.log.1").exists());
        assert_eq!(handler.current_size(), 20 * 40);
    }

    #[test]
    fn test_existing_file_size_counts() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("existing.log");
        fs::write(&base, "x".repeat(90)).unwrap();

        let mut handler = handler(&base, 100, 1);
        handler.handle(&line(0));

        assert_eq!(fs::read_to_string(dir.path().join("existing.log.1")).unwrap().len(), 90);
    }

    #[test]
    fn test_backup_path_naming() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir.path().join("name.log"), 10, 3);
        assert_eq!(handler.backup_path(2), dir.path().join("name.log.2"));
    }

    #[test]
    fn test_failed_rollover_keeps_every_line() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        // The first backup slot is taken by a directory, so rollover fails
        fs::create_dir(dir.path().join("app.log.1")).unwrap();
        let mut handler = handler(&base, 100, 1);

        for i in 0..5 {
            assert_eq!(handler.handle(&line(i)), HandleOutcome::Emitted);
        }

        let content = fs::read_to_string(&base).unwrap();
        let expected: String = (0..5).map(|i| format!("{:039}\n", i)).collect();
        assert_eq!(content, expected);
        assert!(dir.path().join("app.log.1").is_dir());
    }
}
