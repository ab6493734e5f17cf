//! Per-socket settings applied by every socket provider.

use crate::dns::{GaiResolver, Resolve};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpSocket, TcpStream};

/// Socket-level knobs (the Apache `SocketConfig` equivalent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// Read timeout for leased connections. `None` waits forever.
    pub so_timeout: Option<Duration>,
    pub tcp_no_delay: bool,
    pub so_keep_alive: bool,
    /// `None` disables lingering on close.
    pub so_linger: Option<Duration>,
    pub snd_buf_size: Option<u32>,
    pub rcv_buf_size: Option<u32>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            so_timeout: None,
            tcp_no_delay: true,
            so_keep_alive: false,
            so_linger: None,
            snd_buf_size: None,
            rcv_buf_size: None,
        }
    }
}

impl SocketConfig {
    /// Apply the options that must be set before `connect`.
    pub fn apply_to_socket(&self, socket: &TcpSocket) -> io::Result<()> {
        if self.so_keep_alive {
            socket.set_keepalive(true)?;
        }
        if let Some(size) = self.snd_buf_size {
            socket.set_send_buffer_size(size)?;
        }
        if let Some(size) = self.rcv_buf_size {
            socket.set_recv_buffer_size(size)?;
        }
        if self.so_linger.is_some() {
            socket.set_linger(self.so_linger)?;
        }
        Ok(())
    }

    /// Apply the options that can only be set on a connected stream.
    pub fn apply_to_stream(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.tcp_no_delay)
    }
}

/// Everything a socket provider needs to open a connection.
#[derive(Clone)]
pub struct ConnectOptions {
    pub connect_timeout: Option<Duration>,
    pub socket: SocketConfig,
    pub resolver: Arc<dyn Resolve>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            socket: SocketConfig::default(),
            resolver: Arc::new(GaiResolver),
        }
    }
}

impl ConnectOptions {
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_socket_config(mut self, socket: SocketConfig) -> Self {
        self.socket = socket;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connect `socket` to `addr`, bounded by the connect timeout.
    pub async fn connect_socket(
        &self,
        socket: TcpSocket,
        addr: SocketAddr,
    ) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, socket.connect(addr))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??,
            None => socket.connect(addr).await?,
        };
        self.socket.apply_to_stream(&stream)?;
        Ok(stream)
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("connect_timeout", &self.connect_timeout)
            .field("socket", &self.socket)
            .finish_non_exhaustive()
    }
}
