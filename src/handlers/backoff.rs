//! Reconnect backoff for network handlers

use std::time::{Duration, Instant};

/// Exponential reconnect delay
///
/// The first failure waits `retry_start`; each further failure multiplies
/// the wait by `retry_factor` up to `retry_max`. A success resets it.
///
/// # Examples
///
/// ```
/// use rust_log_dispatch::handlers::Backoff;
/// use std::time::{Duration, Instant};
///
/// let mut backoff = Backoff::default();
/// let now = Instant::now();
/// assert_eq!(backoff.record_failure(now), Duration::from_secs(1));
/// assert!(!backoff.can_attempt(now));
/// assert_eq!(backoff.record_failure(now), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct Backoff {
    retry_start: Duration,
    retry_factor: f64,
    retry_max: Duration,
    retry_period: Option<Duration>,
    retry_time: Option<Instant>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(30))
    }
}

impl Backoff {
    pub fn new(retry_start: Duration, retry_factor: f64, retry_max: Duration) -> Self {
        Self {
            retry_start,
            retry_factor: retry_factor.max(1.0),
            retry_max,
            retry_period: None,
            retry_time: None,
        }
    }

    /// Whether a connection attempt is allowed at `now`
    pub fn can_attempt(&self, now: Instant) -> bool {
        self.retry_time.map_or(true, |t| now >= t)
    }

    pub fn record_success(&mut self) {
        self.retry_period = None;
        self.retry_time = None;
    }

    /// Schedule the next attempt and return the delay chosen
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let period = match self.retry_period {
            None => self.retry_start,
            Some(previous) => previous.mul_f64(self.retry_factor),
        }
        .min(self.retry_max);
        self.retry_period = Some(period);
        self.retry_time = Some(now + period);
        period
    }

    pub fn retry_period(&self) -> Option<Duration> {
        self.retry_period
    }

    pub fn retry_time(&self) -> Option<Instant> {
        self.retry_time
    }
}
