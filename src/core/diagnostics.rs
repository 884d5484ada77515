//! Fallback error stream for the library's own diagnostics
//!
//! Handler failures and one-time warnings cannot be logged through the
//! pipeline that produced them. They are written here instead: stderr by
//! default, or any writer installed with [`set_error_stream`].

use super::error::LoggerError;
use super::record::Record;
use parking_lot::Mutex;
use std::io::Write;

type ErrorStream = Box<dyn Write + Send>;

static ERROR_STREAM: Mutex<Option<ErrorStream>> = parking_lot::const_mutex(None);

/// Redirect diagnostics, returning the previously installed writer
pub fn set_error_stream(stream: ErrorStream) -> Option<ErrorStream> {
    ERROR_STREAM.lock().replace(stream)
}

/// Restore stderr as the diagnostic stream
pub fn reset_error_stream() -> Option<ErrorStream> {
    ERROR_STREAM.lock().take()
}

/// Write one diagnostic message; failures to write are ignored
pub fn report(message: &str) {
    let mut guard = ERROR_STREAM.lock();
    match guard.as_mut() {
        Some(stream) => {
            let _ = writeln!(stream, "{}", message);
            let _ = stream.flush();
        }
        None => eprintln!("{}", message),
    }
}

/// Default `handle_error` report for a failed emission
pub fn report_handler_error(handler: &str, record: &Record, error: &LoggerError) {
    let mut message = format!(
        "[LOGGER ERROR] Handler '{}' failed: {}\n  Logger: {}\n  Message: {}",
        handler,
        error,
        display_name(&record.logger_name),
        record.message_template
    );
    if !record.args.is_empty() {
        message.push_str(&format!("\n  Arguments: {}", record.args));
    }
    report(&message);
}

pub(crate) fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "root"
    } else {
        name
    }
}
