//! TCP socket handler
//!
//! Each record is sent as a 4-byte big-endian length followed by a JSON
//! object with the record's fields. Delivery is best effort: while the
//! remote end is unreachable records are dropped and reconnects are spaced
//! out by a [`Backoff`].

use super::backoff::Backoff;
use crate::core::args::LogArgs;
use crate::core::{Handler, HandlerCore, LoggerError, Record, Result};
use serde::Serialize;
use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Record fields as sent over the wire
#[derive(Debug, Serialize)]
pub struct WireRecord<'a> {
    pub name: &'a str,
    pub levelno: u8,
    pub levelname: &'a str,
    pub msg: &'a str,
    /// Interpolated message
    pub message: String,
    pub args: &'a LogArgs,
    pub created: f64,
    pub thread: &'a str,
    #[serde(rename = "threadName")]
    pub thread_name: &'a str,
    pub process: u32,
    pub exc_info: Option<String>,
}

/// Length-prefixed JSON payload for `record`
pub fn encode_record(record: &Record, message: String) -> Result<Vec<u8>> {
    let wire = WireRecord {
        name: &record.logger_name,
        levelno: record.level.as_u8(),
        levelname: record.level.to_str(),
        msg: &record.message_template,
        message,
        args: &record.args,
        created: record.timestamp_secs(),
        thread: &record.thread_id,
        thread_name: record.thread_label(),
        process: record.process_id,
        exc_info: record.exception.as_ref().map(|e| e.render()),
    };
    let body = serde_json::to_vec(&wire)?;
    let len = u32::try_from(body.len())
        .map_err(|_| LoggerError::other(format!("Record too large to send: {} bytes", body.len())))?;

    let mut payload = Vec::with_capacity(body.len() + 4);
    payload.extend_from_slice(&len.to_be_bytes());
    payload.extend_from_slice(&body);
    Ok(payload)
}

/// Handler streaming records to a TCP endpoint
///
/// # Example
///
/// ```no_run
/// use rust_log_dispatch::handlers::SocketHandler;
/// use rust_log_dispatch::prelude::*;
/// use std::time::Duration;
///
/// let handler = SocketHandler::new("127.0.0.1:9020")
///     .with_connect_timeout(Duration::from_secs(2))
///     .with_close_on_error(true);
///
/// let registry = LoggerRegistry::new();
/// registry.root().add_handler(shared(handler));
/// ```
#[derive(Debug)]
pub struct SocketHandler {
    core: HandlerCore,
    address: String,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
    backoff: Backoff,
    close_on_error: bool,
    dropped: u64,
}

impl SocketHandler {
    /// Handler for `address` (`host:port`); connects on first emit
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            core: HandlerCore::new(),
            address: address.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream: None,
            backoff: Backoff::default(),
            close_on_error: false,
            dropped: 0,
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Drop the connection on emit errors instead of reporting them
    #[must_use]
    pub fn with_close_on_error(mut self, close: bool) -> Self {
        self.close_on_error = close;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Payloads discarded while disconnected
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    fn make_socket(&self) -> Result<TcpStream> {
        let addrs = self.address.to_socket_addrs().map_err(|e| {
            LoggerError::connectivity(&self.address, format!("Cannot resolve: {}", e))
        })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(self.connect_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(LoggerError::connectivity(
            &self.address,
            last_error.map_or_else(|| "No addresses resolved".to_string(), |e| e.to_string()),
        ))
    }

    /// Try to connect unless a backoff delay is still pending at `now`
    pub fn create_socket_at(&mut self, now: Instant) {
        if !self.backoff.can_attempt(now) {
            return;
        }
        match self.make_socket() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.backoff.record_success();
            }
            Err(_) => {
                self.backoff.record_failure(now);
            }
        }
    }

    /// Write `payload`, connecting first if needed; lost payloads are counted
    pub fn send(&mut self, payload: &[u8]) {
        if self.stream.is_none() {
            self.create_socket_at(Instant::now());
        }
        let Some(stream) = self.stream.as_mut() else {
            self.dropped += 1;
            return;
        };
        if stream.write_all(payload).is_err() {
            self.close_socket();
            self.dropped += 1;
        }
    }

    fn close_socket(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Handler for SocketHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn emit(&mut self, record: &Record) -> Result<()> {
        let message = self.core.formatter().format_message(record)?;
        let payload = encode_record(record, message)?;
        self.send(&payload);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut stream) = self.stream {
            stream.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.close_socket();
    }

    fn handle_error(&mut self, record: &Record, error: &LoggerError) {
        if self.close_on_error && self.stream.is_some() {
            self.close_socket();
        } else {
            crate::core::diagnostics::report_handler_error(self.name(), record, error);
        }
    }

    fn name(&self) -> &str {
        "socket"
    }
}

impl Drop for SocketHandler {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExceptionInfo, LogLevel};
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    #[test]
    fn test_payload_layout() {
        let record = Record::new("net.client", LogLevel::Error, "lost %(peer)s")
            .with_arg("peer", "db-1")
            .with_exception(ExceptionInfo::new("Reset", "by peer"));
        let payload = encode_record(&record, "lost db-1".to_string()).unwrap();

        let len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
        assert_eq!(len, payload.len() - 4);

        let body: serde_json::Value = serde_json::from_slice(&payload[4..]).unwrap();
        assert_eq!(body["name"], "net.client");
        assert_eq!(body["levelname"], "ERROR");
        assert_eq!(body["msg"], "lost %(peer)s");
        assert_eq!(body["message"], "lost db-1");
        assert_eq!(body["args"]["peer"], "db-1");
        assert_eq!(body["exc_info"], "Reset: by peer");
    }

    #[test]
    fn test_delivers_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut len = [0u8; 4];
            conn.read_exact(&mut len).unwrap();
            let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
            conn.read_exact(&mut body).unwrap();
            serde_json::from_slice::<serde_json::Value>(&body).unwrap()
        });

        let mut handler = SocketHandler::new(addr);
        let outcome = handler.handle(&Record::new("svc", LogLevel::Warn, "hello"));
        assert_eq!(outcome, crate::core::HandleOutcome::Emitted);
        assert!(handler.is_connected());

        let body = server.join().unwrap();
        assert_eq!(body["name"], "svc");
        assert_eq!(body["message"], "hello");
        handler.close();
        handler.close();
        assert!(!handler.is_connected());
    }

    #[test]
    fn test_unreachable_drops_silently() {
        let mut handler = SocketHandler::new(closed_port())
            .with_connect_timeout(Duration::from_millis(200));
        let outcome = handler.handle(&Record::new("svc", LogLevel::Info, "lost"));

        assert_eq!(outcome, crate::core::HandleOutcome::Emitted);
        assert!(!handler.is_connected());
        assert_eq!(handler.dropped(), 1);
    }

    #[test]
    fn test_backoff_between_failed_connects() {
        let backoff = Backoff::new(Duration::from_secs(1), 2.0, Duration::from_secs(3));
        let mut handler = SocketHandler::new(closed_port())
            .with_connect_timeout(Duration::from_millis(200))
            .with_backoff(backoff);
        let start = Instant::now();

        handler.create_socket_at(start);
        assert_eq!(handler.backoff().retry_period(), Some(Duration::from_secs(1)));

        // Still inside the delay: no new attempt
        handler.create_socket_at(start);
        assert_eq!(handler.backoff().retry_period(), Some(Duration::from_secs(1)));

        handler.create_socket_at(start + Duration::from_secs(1));
        assert_eq!(handler.backoff().retry_period(), Some(Duration::from_secs(2)));

        handler.create_socket_at(start + Duration::from_secs(3));
        assert_eq!(handler.backoff().retry_period(), Some(Duration::from_secs(3)));
    }
}
