//! Concrete handlers

pub mod backoff;
pub mod file;
pub mod rotating_file;
pub mod socket;
pub mod stream;
pub mod syslog;
pub mod timed_rotating_file;
pub mod watched_file;

pub use crate::core::handler::NullHandler;
pub use backoff::Backoff;
pub use file::{FileHandler, FileMode, FileOptions, FileTarget};
pub use rotating_file::{RotatingFileHandler, RotationPolicy};
pub use socket::{encode_record, SocketHandler, WireRecord};
pub use stream::{StreamHandler, StreamTarget};
pub use syslog::{Facility, SyslogAddress, SyslogHandler};
pub use timed_rotating_file::{TimedRotatingFileHandler, TimedRotationPolicy, When};
pub use watched_file::WatchedFileHandler;
