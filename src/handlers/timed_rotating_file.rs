//! Time-based rotating file handler
//!
//! The handler keeps the absolute time of the next rollover. A record stamped
//! at or after it rolls the file over: the base file is renamed with a date
//! suffix derived from the rollover boundary (`app.log.2024-05-17`), old
//! backups beyond `backup_count` are removed and a new base file is started.

use super::file::{FileMode, FileTarget};
use crate::core::{Handler, HandlerCore, LoggerError, Record, Result};
use chrono::{DateTime, Datelike, Local, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

const SECONDS_SUFFIX: &str = "%Y-%m-%d_%H-%M-%S";
const MINUTES_SUFFIX: &str = "%Y-%m-%d_%H-%M";
const HOURS_SUFFIX: &str = "%Y-%m-%d_%H";
const DAYS_SUFFIX: &str = "%Y-%m-%d";

static SECONDS_MATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}$").expect("Invalid seconds suffix regex")
});
static MINUTES_MATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}_\d{2}-\d{2}$").expect("Invalid minutes suffix regex")
});
static HOURS_MATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}_\d{2}$").expect("Invalid hours suffix regex")
});
static DAYS_MATCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid days suffix regex"));

const DAY_SECS: i64 = 24 * 60 * 60;

/// Rollover unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    Seconds,
    Minutes,
    Hours,
    Days,
    /// At `at_time` (default 00:00) every day
    Midnight,
    /// At `at_time` on the given weekday, 0 = Monday .. 6 = Sunday
    Weekday(u8),
}

impl When {
    fn unit_secs(self) -> i64 {
        match self {
            When::Seconds => 1,
            When::Minutes => 60,
            When::Hours => 60 * 60,
            When::Days | When::Midnight => DAY_SECS,
            When::Weekday(_) => 7 * DAY_SECS,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            When::Seconds => SECONDS_SUFFIX,
            When::Minutes => MINUTES_SUFFIX,
            When::Hours => HOURS_SUFFIX,
            When::Days | When::Midnight | When::Weekday(_) => DAYS_SUFFIX,
        }
    }

    fn suffix_match(self) -> &'static Regex {
        match self {
            When::Seconds => &SECONDS_MATCH,
            When::Minutes => &MINUTES_MATCH,
            When::Hours => &HOURS_MATCH,
            When::Days | When::Midnight | When::Weekday(_) => &DAYS_MATCH,
        }
    }
}

impl std::str::FromStr for When {
    type Err = LoggerError;

    /// `S`, `M`, `H`, `D`, `midnight` or `W0`..`W6`, case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "S" => Ok(When::Seconds),
            "M" => Ok(When::Minutes),
            "H" => Ok(When::Hours),
            "D" => Ok(When::Days),
            "MIDNIGHT" => Ok(When::Midnight),
            _ => {
                let day = upper
                    .strip_prefix('W')
                    .filter(|d| d.len() == 1)
                    .and_then(|d| d.parse::<u8>().ok())
                    .filter(|d| *d <= 6)
                    .ok_or_else(|| {
                        LoggerError::config("timed_rotating_file", format!("Invalid rollover unit '{}'", s))
                    })?;
                Ok(When::Weekday(day))
            }
        }
    }
}

/// Schedule of a [`TimedRotatingFileHandler`]
///
/// # Examples
///
/// ```
/// use rust_log_dispatch::handlers::{TimedRotationPolicy, When};
///
/// let policy = TimedRotationPolicy::new(When::Hours)
///     .with_interval(6)
///     .with_backup_count(4)
///     .with_utc(true);
/// assert_eq!(policy.interval_secs(), 6 * 3600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedRotationPolicy {
    pub when: When,
    /// Number of units between rollovers
    pub interval: u32,
    pub backup_count: usize,
    /// Compute boundaries and suffixes in UTC instead of local time
    pub utc: bool,
    /// Time of day for `Midnight` and `Weekday` rollovers
    pub at_time: Option<NaiveTime>,
    pub delay: bool,
}

impl TimedRotationPolicy {
    pub fn new(when: When) -> Self {
        Self {
            when,
            interval: 1,
            backup_count: 0,
            utc: false,
            at_time: None,
            delay: false,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    #[must_use]
    pub fn with_utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    #[must_use]
    pub fn with_at_time(mut self, at_time: NaiveTime) -> Self {
        self.at_time = Some(at_time);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: bool) -> Self {
        self.delay = delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(LoggerError::config(
                "timed_rotating_file",
                "interval must be at least 1",
            ));
        }
        if let When::Weekday(day) = self.when {
            if day > 6 {
                return Err(LoggerError::config(
                    "timed_rotating_file",
                    format!("weekday must be 0-6, got {}", day),
                ));
            }
        }
        Ok(())
    }

    /// Seconds between two rollovers
    pub fn interval_secs(&self) -> i64 {
        self.when.unit_secs() * i64::from(self.interval)
    }

    /// Next rollover time, in seconds since the epoch, after `current`
    ///
    /// Fixed units simply add the interval. `Midnight` and `Weekday` anchor
    /// to the next `at_time` strictly after `current`, on the right weekday.
    pub fn compute_rollover(&self, current: i64) -> i64 {
        match self.when {
            When::Midnight | When::Weekday(_) => {
                if self.utc {
                    self.next_anchor(&Utc, current)
                } else {
                    self.next_anchor(&Local, current)
                }
            }
            _ => current + self.interval_secs(),
        }
    }

    fn next_anchor<Tz: TimeZone>(&self, tz: &Tz, current: i64) -> i64 {
        let at = self.at_time.unwrap_or(NaiveTime::MIN);
        let Some(now) = DateTime::from_timestamp(current, 0) else {
            return current + self.interval_secs();
        };
        let now = now.with_timezone(tz);

        let mut date = now.date_naive();
        if resolve_local(tz, date.and_time(at)) <= current {
            date = date.succ_opt().unwrap_or(date);
        }
        if let When::Weekday(day) = self.when {
            let current_day = date.weekday().num_days_from_monday() as i64;
            let wait = (i64::from(day) - current_day).rem_euclid(7) as u64;
            date = date.checked_add_days(chrono::Days::new(wait)).unwrap_or(date);
        }
        resolve_local(tz, date.and_time(at))
    }

    /// Backup suffix for a rollover happening at `rollover_at`
    pub fn suffix_for(&self, rollover_at: i64) -> String {
        let boundary = rollover_at - self.interval_secs();
        let Some(time) = DateTime::from_timestamp(boundary, 0) else {
            return boundary.to_string();
        };
        if self.utc {
            time.format(self.when.suffix()).to_string()
        } else {
            time.with_timezone(&Local).format(self.when.suffix()).to_string()
        }
    }
}

/// Epoch seconds for a wall-clock time, taking the earlier side of DST folds
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: chrono::NaiveDateTime) -> i64 {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.timestamp())
        .unwrap_or_else(|| naive.and_utc().timestamp())
}

/// File handler rotating on a time schedule
///
/// # Examples
///
/// ```no_run
/// use rust_log_dispatch::handlers::{TimedRotatingFileHandler, TimedRotationPolicy, When};
///
/// let policy = TimedRotationPolicy::new(When::Midnight).with_backup_count(7);
/// let handler = TimedRotatingFileHandler::with_policy("/var/log/app.log", policy).unwrap();
/// ```
#[derive(Debug)]
pub struct TimedRotatingFileHandler {
    core: HandlerCore,
    target: FileTarget,
    policy: TimedRotationPolicy,
    rollover_at: i64,
}

impl TimedRotatingFileHandler {
    pub fn new(path: impl Into<PathBuf>, when: When) -> Result<Self> {
        Self::with_policy(path, TimedRotationPolicy::new(when))
    }

    pub fn with_policy(path: impl Into<PathBuf>, policy: TimedRotationPolicy) -> Result<Self> {
        policy.validate()?;
        let path = path.into();

        // An existing file rolls over relative to its last modification
        let base_time = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        let base_secs = DateTime::<Utc>::from(base_time).timestamp();

        let mut target = FileTarget::new(path, FileMode::Append);
        if !policy.delay {
            target.open()?;
        }

        Ok(Self {
            core: HandlerCore::new(),
            rollover_at: policy.compute_rollover(base_secs),
            target,
            policy,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.target.path()
    }

    #[must_use]
    pub fn policy(&self) -> &TimedRotationPolicy {
        &self.policy
    }

    /// Next rollover time in seconds since the epoch
    #[must_use]
    pub fn rollover_at(&self) -> i64 {
        self.rollover_at
    }

    pub fn should_rollover(&self, record: &Record) -> bool {
        record.timestamp.timestamp() >= self.rollover_at
    }

    /// Rename the base file to its dated name and start a new one.
    ///
    /// `current` is the time that triggered the rollover; the next boundary
    /// is computed from it. The boundary advances and the new file is opened
    /// even when the rename or the pruning of expired backups fails, so one
    /// failure never causes a second rollover in the same interval.
    pub fn do_rollover(&mut self, current: i64) -> Result<()> {
        let rotated = self.target.close().and_then(|()| self.rotate_base());

        let mut next = self.policy.compute_rollover(current);
        while next <= current {
            next += self.policy.interval_secs();
        }
        self.rollover_at = next;

        if !self.policy.delay {
            self.target.open()?;
        }
        rotated?;

        if self.policy.backup_count > 0 {
            self.prune_backups()?;
        }
        Ok(())
    }

    fn rotate_base(&self) -> Result<()> {
        let dated = self.dated_path(&self.policy.suffix_for(self.rollover_at));
        let base = self.target.path();
        if !base.exists() {
            return Ok(());
        }
        if dated.exists() {
            fs::remove_file(&dated).map_err(|e| {
                LoggerError::file_rotation(
                    dated.display().to_string(),
                    format!("Failed to remove old backup: {}", e),
                )
            })?;
        }
        fs::rename(base, &dated).map_err(|e| {
            LoggerError::file_rotation(
                base.display().to_string(),
                format!("Failed to rename to '{}': {}", dated.display(), e),
            )
        })
    }

    /// Remove every expired backup; the first failure is returned after all
    /// removals were attempted.
    fn prune_backups(&self) -> Result<()> {
        let mut first_error = None;
        for old in self.files_to_delete()? {
            if let Err(e) = fs::remove_file(&old) {
                first_error.get_or_insert_with(|| {
                    LoggerError::file_rotation(
                        old.display().to_string(),
                        format!("Failed to remove expired backup: {}", e),
                    )
                });
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn dated_path(&self, suffix: &str) -> PathBuf {
        let base = self.target.path();
        let mut name = base.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(suffix);
        base.with_file_name(name)
    }

    /// Oldest backups exceeding `backup_count`
    fn files_to_delete(&self) -> Result<Vec<PathBuf>> {
        let base = self.target.path();
        let dir = match base.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = format!(
            "{}.",
            base.file_name().unwrap_or_default().to_string_lossy()
        );
        let pattern = self.policy.when.suffix_match();

        let entries = fs::read_dir(&dir).map_err(|e| {
            LoggerError::io_operation(
                "list log backups",
                format!("Failed to read directory '{}'", dir.display()),
                e,
            )
        })?;

        let mut backups: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let suffix = name.strip_prefix(&prefix)?;
                pattern
                    .is_match(suffix)
                    .then(|| (suffix.to_string(), entry.path()))
            })
            .collect();

        if backups.len() <= self.policy.backup_count {
            return Ok(Vec::new());
        }
        backups.sort();
        let excess = backups.len() - self.policy.backup_count;
        Ok(backups.into_iter().take(excess).map(|(_, p)| p).collect())
    }
}

impl Handler for TimedRotatingFileHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn emit(&mut self, record: &Record) -> Result<()> {
        let line = self.core.format(record)?;
        if self.should_rollover(record) {
            if let Err(e) = self.do_rollover(record.timestamp.timestamp()) {
                self.handle_error(record, &e);
            }
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
        "timed_rotating_file"
    }
}
