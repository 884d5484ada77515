//! Syslog handler
//!
//! Sends each record as one datagram `<PRI>ident message` to a syslog daemon
//! over UDP or a local Unix datagram socket (`/dev/log`). `PRI` combines the
//! facility code with the severity mapped from the record's level.

use crate::core::{Handler, HandlerCore, LogLevel, LoggerError, Record, Result};
use serde::{Deserialize, Serialize};
use std::net::{ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SYSLOG_PORT: u16 = 514;

/// Syslog facility codes (RFC 5424)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Facility {
    Kern,
    #[default]
    User,
    Mail,
    Daemon,
    Auth,
    Syslog,
    Lpr,
    News,
    Uucp,
    Cron,
    Authpriv,
    Ftp,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl Facility {
    pub fn code(self) -> u8 {
        match self {
            Facility::Kern => 0,
            Facility::User => 1,
            Facility::Mail => 2,
            Facility::Daemon => 3,
            Facility::Auth => 4,
            Facility::Syslog => 5,
            Facility::Lpr => 6,
            Facility::News => 7,
            Facility::Uucp => 8,
            Facility::Cron => 9,
            Facility::Authpriv => 10,
            Facility::Ftp => 11,
            Facility::Local0 => 16,
            Facility::Local1 => 17,
            Facility::Local2 => 18,
            Facility::Local3 => 19,
            Facility::Local4 => 20,
            Facility::Local5 => 21,
            Facility::Local6 => 22,
            Facility::Local7 => 23,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Facility::Kern => "kern",
            Facility::User => "user",
            Facility::Mail => "mail",
            Facility::Daemon => "daemon",
            Facility::Auth => "auth",
            Facility::Syslog => "syslog",
            Facility::Lpr => "lpr",
            Facility::News => "news",
            Facility::Uucp => "uucp",
            Facility::Cron => "cron",
            Facility::Authpriv => "authpriv",
            Facility::Ftp => "ftp",
            Facility::Local0 => "local0",
            Facility::Local1 => "local1",
            Facility::Local2 => "local2",
            Facility::Local3 => "local3",
            Facility::Local4 => "local4",
            Facility::Local5 => "local5",
            Facility::Local6 => "local6",
            Facility::Local7 => "local7",
        }
    }
}

impl FromStr for Facility {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        let facility = match s.to_ascii_lowercase().as_str() {
            "kern" => Facility::Kern,
            "user" => Facility::User,
            "mail" => Facility::Mail,
            "daemon" => Facility::Daemon,
            "auth" | "security" => Facility::Auth,
            "syslog" => Facility::Syslog,
            "lpr" => Facility::Lpr,
            "news" => Facility::News,
            "uucp" => Facility::Uucp,
            "cron" => Facility::Cron,
            "authpriv" => Facility::Authpriv,
            "ftp" => Facility::Ftp,
            "local0" => Facility::Local0,
            "local1" => Facility::Local1,
            "local2" => Facility::Local2,
            "local3" => Facility::Local3,
            "local4" => Facility::Local4,
            "local5" => Facility::Local5,
            "local6" => Facility::Local6,
            "local7" => Facility::Local7,
            _ => {
                return Err(LoggerError::config(
                    "syslog",
                    format!("Unknown facility '{}'", s),
                ))
            }
        };
        Ok(facility)
    }
}

impl TryFrom<String> for Facility {
    type Error = LoggerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Facility> for String {
    fn from(facility: Facility) -> Self {
        facility.as_str().to_string()
    }
}

/// Syslog severity for a level
pub fn severity(level: LogLevel) -> u8 {
    match level {
        LogLevel::Trace | LogLevel::Debug => 7,
        LogLevel::Info => 6,
        LogLevel::Warn => 4,
        LogLevel::Error => 3,
        LogLevel::Fatal => 2,
    }
}

/// `PRI` value for a facility and level
pub fn priority(facility: Facility, level: LogLevel) -> u8 {
    (facility.code() << 3) | severity(level)
}

/// Where the daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogAddress {
    /// `host:port`
    Udp(String),
    /// Unix datagram socket path
    Unix(PathBuf),
}

impl Default for SyslogAddress {
    fn default() -> Self {
        SyslogAddress::Udp(format!("localhost:{}", DEFAULT_SYSLOG_PORT))
    }
}

enum Transport {
    Udp(UdpSocket),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixDatagram),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Udp(_) => f.write_str("Udp"),
            #[cfg(unix)]
            Transport::Unix(_) => f.write_str("Unix"),
        }
    }
}

/// Handler sending records to a syslog daemon
///
/// # Examples
///
/// ```no_run
/// use rust_log_dispatch::handlers::{Facility, SyslogAddress, SyslogHandler};
///
/// let handler = SyslogHandler::new(SyslogAddress::Unix("/dev/log".into()))
///     .with_facility(Facility::Local3)
///     .with_ident("billing: ");
/// ```
#[derive(Debug)]
pub struct SyslogHandler {
    core: HandlerCore,
    address: SyslogAddress,
    facility: Facility,
    ident: String,
    append_nul: bool,
    transport: Option<Transport>,
}

impl SyslogHandler {
    /// Handler for `address`; the socket is opened on first emit
    pub fn new(address: SyslogAddress) -> Self {
        Self {
            core: HandlerCore::new(),
            address,
            facility: Facility::default(),
            ident: String::new(),
            append_nul: true,
            transport: None,
        }
    }

    #[must_use]
    pub fn with_facility(mut self, facility: Facility) -> Self {
        self.facility = facility;
        self
    }

    /// Text inserted between the priority and the message
    #[must_use]
    pub fn with_ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = ident.into();
        self
    }

    /// Terminate each message with a NUL byte (on by default)
    #[must_use]
    pub fn with_append_nul(mut self, append: bool) -> Self {
        self.append_nul = append;
        self
    }

    pub fn facility(&self) -> Facility {
        self.facility
    }

    pub fn address(&self) -> &SyslogAddress {
        &self.address
    }

    fn connect(&self) -> Result<Transport> {
        match &self.address {
            SyslogAddress::Udp(target) => {
                let addr = target
                    .to_socket_addrs()
                    .map_err(|e| LoggerError::connectivity(target, format!("Cannot resolve: {}", e)))?
                    .next()
                    .ok_or_else(|| LoggerError::connectivity(target, "No addresses resolved"))?;
                let bind = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                let socket = UdpSocket::bind(bind)?;
                socket.connect(addr)?;
                Ok(Transport::Udp(socket))
            }
            #[cfg(unix)]
            SyslogAddress::Unix(path) => {
                let socket = std::os::unix::net::UnixDatagram::unbound()?;
                socket.connect(path).map_err(|e| {
                    LoggerError::connectivity(path.display().to_string(), e.to_string())
                })?;
                Ok(Transport::Unix(socket))
            }
            #[cfg(not(unix))]
            SyslogAddress::Unix(path) => Err(LoggerError::config(
                "syslog",
                format!("Unix sockets are not supported here: {}", path.display()),
            )),
        }
    }

    /// Full datagram for `message` at `level`
    pub fn encode(&self, level: LogLevel, message: &str) -> Vec<u8> {
        let mut datagram = format!(
            "<{}>{}{}",
            priority(self.facility, level),
            self.ident,
            message
        )
        .into_bytes();
        if self.append_nul {
            datagram.push(0);
        }
        datagram
    }

    fn send(&mut self, datagram: &[u8]) -> Result<()> {
        if self.transport.is_none() {
            self.transport = Some(self.connect()?);
        }
        match self.transport.as_ref() {
            Some(Transport::Udp(socket)) => {
                socket.send(datagram)?;
                Ok(())
            }
            #[cfg(unix)]
            Some(Transport::Unix(socket)) => {
                if socket.send(datagram).is_ok() {
                    return Ok(());
                }
                // The daemon may have restarted: reconnect once
                self.transport = None;
                let transport = self.connect()?;
                if let Transport::Unix(ref socket) = transport {
                    socket.send(datagram)?;
                }
                self.transport = Some(transport);
                Ok(())
            }
            None => Err(LoggerError::connectivity(
                format!("{:?}", self.address),
                "Not connected",
            )),
        }
    }
}

impl Handler for SyslogHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn emit(&mut self, record: &Record) -> Result<()> {
        let message = self.core.format(record)?;
        let datagram = self.encode(record.level, &message);
        self.send(&datagram)
    }

    fn close(&mut self) {
        self.transport = None;
    }

    fn name(&self) -> &str {
        "syslog"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Formatter;
    use std::time::Duration;

    #[test]
    fn test_priority_table() {
        assert_eq!(priority(Facility::User, LogLevel::Info), 14);
        assert_eq!(priority(Facility::Kern, LogLevel::Fatal), 2);
        assert_eq!(priority(Facility::Local7, LogLevel::Debug), 191);
        assert_eq!(priority(Facility::Daemon, LogLevel::Warn), 28);
    }

    #[test]
    fn test_facility_parsing() {
        assert_eq!("LOCAL3".parse::<Facility>().unwrap(), Facility::Local3);
        assert_eq!("security".parse::<Facility>().unwrap(), Facility::Auth);
        assert!("nonsense".parse::<Facility>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_encode() {
        let handler = SyslogHandler::new(SyslogAddress::default())
            .with_facility(Facility::Local0)
            .with_ident("app: ");
        assert_eq!(handler.encode(LogLevel::Error, "boom"), b"<131>app: boom\0".to_vec());

        let bare = handler.with_append_nul(false);
        assert_eq!(bare.encode(LogLevel::Info, "ok"), b"<134>app: ok".to_vec());
    }

    #[test]
    fn test_udp_delivery() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let mut handler = SyslogHandler::new(SyslogAddress::Udp(addr))
            .with_formatter(Formatter::new("%(name)s: %(message)s"));
        handler.handle(&Record::new("cron", LogLevel::Warn, "job late"));

        let mut buf = [0u8; 256];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"<12>cron: job late\0");
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_delivery() {
        use std::os::unix::net::UnixDatagram;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("log.sock");
        let server = UnixDatagram::bind(&path).unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let mut handler = SyslogHandler::new(SyslogAddress::Unix(path))
            .with_formatter(Formatter::new("%(message)s"))
            .with_append_nul(false);
        handler.handle(&Record::new("x", LogLevel::Info, "local"));

        let mut buf = [0u8; 64];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"<14>local");
    }
}
