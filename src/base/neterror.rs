use std::io;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection to {host}:{port} failed: {source}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Name {domain} not resolved: {source}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Socket not connected")]
    SocketNotConnected,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Address invalid")]
    AddressInvalid,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("SOCKS connection failed")]
    SocksConnectionFailed,
    #[error("SOCKS connection host unreachable")]
    SocksConnectionHostUnreachable,
    #[error("Socket read timed out")]
    SocketReadTimedOut,

    // URL Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown URL scheme: {0}")]
    UnknownUrlScheme(String),

    // Connection manager errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("TLS configuration error: {reason}")]
    TlsConfiguration { reason: String },
    #[error("Unsupported connection manager type: {0}")]
    UnsupportedManagerType(String),
    #[error("IO reactor failed to start: {0}")]
    IoReactorStartup(String),
    #[error("Connection manager has been shut down")]
    ManagerShutdown,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    /// Build a [`NetError::ConnectionFailedTo`] from an IO failure.
    pub fn connection_failed_to(host: &str, port: u16, source: io::Error) -> Self {
        NetError::ConnectionFailedTo { host: host.to_string(), port, source: Arc::new(source) }
    }

    /// Build a [`NetError::NameNotResolvedFor`] from an IO failure.
    pub fn dns_failed(domain: &str, source: io::Error) -> Self {
        NetError::NameNotResolvedFor { domain: domain.to_string(), source: Arc::new(source) }
    }

    pub fn tls_configuration(reason: impl Into<String>) -> Self {
        NetError::TlsConfiguration { reason: reason.into() }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        NetError::InvalidArgument(reason.into())
    }

    /// Chromium-compatible error code. Manager-level errors use the custom
    /// range starting at -10000.
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed | NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolved | NetError::NameNotResolvedFor { .. } => -105,
            NetError::SslProtocolError => -107,
            NetError::AddressInvalid => -108,
            NetError::AddressUnreachable => -109,
            NetError::SocketNotConnected => -112,
            NetError::ConnectionTimedOut => -118,
            NetError::SocksConnectionFailed => -120,
            NetError::SocksConnectionHostUnreachable => -121,
            NetError::InvalidUrl => -300,
            NetError::UnknownUrlScheme(_) => -302,
            NetError::SocketReadTimedOut => -10000,
            NetError::InvalidArgument(_) => -10001,
            NetError::TlsConfiguration { .. } => -10002,
            NetError::UnsupportedManagerType(_) => -10003,
            NetError::IoReactorStartup(_) => -10004,
            NetError::ManagerShutdown => -10005,
            NetError::Unknown(code) => *code,
        }
    }

    /// Returns true for errors raised while validating configuration, before
    /// any socket was opened.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            NetError::InvalidArgument(_)
                | NetError::TlsConfiguration { .. }
                | NetError::UnsupportedManagerType(_)
        )
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -107 => NetError::SslProtocolError,
            -108 => NetError::AddressInvalid,
            -109 => NetError::AddressUnreachable,
            -112 => NetError::SocketNotConnected,
            -118 => NetError::ConnectionTimedOut,
            -120 => NetError::SocksConnectionFailed,
            -121 => NetError::SocksConnectionHostUnreachable,
            -300 => NetError::InvalidUrl,
            -10000 => NetError::SocketReadTimedOut,
            -10005 => NetError::ManagerShutdown,
            _ => NetError::Unknown(code),
        }
    }
}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::NotConnected => NetError::SocketNotConnected,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            io::ErrorKind::UnexpectedEof => NetError::ConnectionClosed,
            io::ErrorKind::AddrNotAvailable => NetError::AddressUnreachable,
            _ => NetError::ConnectionFailed,
        }
    }
}
