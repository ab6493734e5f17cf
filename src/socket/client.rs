use std::fmt;
use std::io::ErrorKind;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// A connected socket (TCP or TLS) that can report its own liveness.
pub trait StreamSocket: AsyncRead + AsyncWrite + Unpin + Send + Sync + fmt::Debug {
    /// Returns true if the socket is still connected.
    /// Non-blocking; a peer that vanished without FIN/RST still looks alive.
    fn is_connected(&self) -> bool;
}

/// A socket produced by a registry factory.
#[derive(Debug)]
pub enum SocketType {
    Tcp(TcpStream),
    Ssl(tokio_boring::SslStream<TcpStream>),
}

impl SocketType {
    /// The TCP stream underneath any TLS layer.
    pub fn tcp(&self) -> &TcpStream {
        match self {
            SocketType::Tcp(s) => s,
            SocketType::Ssl(s) => s.get_ref(),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, SocketType::Ssl(_))
    }

    /// Peek (never read) one byte to detect FIN/RST on an idle socket.
    /// Pending data counts as connected; for TLS it is usually a session
    /// ticket the server sent after the handshake.
    fn check_tcp_connected(stream: &TcpStream) -> bool {
        if stream.peer_addr().is_err() {
            return false;
        }

        let mut buf = [0u8; 1];
        let mut read_buf = ReadBuf::new(&mut buf);
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        match stream.poll_peek(&mut cx, &mut read_buf) {
            Poll::Ready(Ok(0)) => false,
            Poll::Ready(Ok(_)) => true,
            Poll::Ready(Err(ref e)) if e.kind() == ErrorKind::WouldBlock => true,
            Poll::Ready(Err(_)) => false,
            Poll::Pending => true,
        }
    }
}

impl AsyncRead for SocketType {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SocketType {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_flush(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

impl StreamSocket for SocketType {
    fn is_connected(&self) -> bool {
        Self::check_tcp_connected(self.tcp())
    }
}
