//! SOCKS5 client handshake (RFC 1928) with optional username/password
//! authentication (RFC 1929).
//!
//! The target host name is sent to the proxy unresolved, so DNS happens on
//! the proxy side.

use crate::base::neterror::NetError;
use std::net::IpAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zeroize::Zeroizing;

const SOCKS_VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_USER_PASS: u8 = 0x02;
const METHOD_NONE_ACCEPTABLE: u8 = 0xff;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Username/password pair for RFC 1929 sub-negotiation.
#[derive(Clone)]
pub struct SocksCredentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for SocksCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocksCredentials").field("username", &self.username).finish_non_exhaustive()
    }
}

/// Run the client side of a SOCKS5 CONNECT on an already-connected proxy
/// stream. On success the stream is a tunnel to `host:port`.
pub async fn connect<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    credentials: Option<&SocksCredentials>,
) -> Result<(), NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    negotiate_method(stream, credentials).await?;
    send_connect(stream, host, port).await?;
    read_reply(stream).await
}

async fn negotiate_method<S>(
    stream: &mut S,
    credentials: Option<&SocksCredentials>,
) -> Result<(), NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting: &[u8] = if credentials.is_some() {
        &[SOCKS_VERSION, 2, METHOD_NO_AUTH, METHOD_USER_PASS]
    } else {
        &[SOCKS_VERSION, 1, METHOD_NO_AUTH]
    };
    stream.write_all(greeting).await.map_err(|_| NetError::SocksConnectionFailed)?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await.map_err(|_| NetError::SocksConnectionFailed)?;
    if choice[0] != SOCKS_VERSION {
        return Err(NetError::SocksConnectionFailed);
    }

    match (choice[1], credentials) {
        (METHOD_NO_AUTH, _) => Ok(()),
        (METHOD_USER_PASS, Some(creds)) => authenticate(stream, creds).await,
        (METHOD_NONE_ACCEPTABLE, _) => {
            tracing::debug!("SOCKS proxy rejected offered auth methods");
            Err(NetError::SocksConnectionFailed)
        }
        (method, _) => {
            tracing::debug!(method, "SOCKS proxy selected an unsupported method");
            Err(NetError::SocksConnectionFailed)
        }
    }
}

async fn authenticate<S>(stream: &mut S, creds: &SocksCredentials) -> Result<(), NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let user = creds.username.as_bytes();
    let pass = creds.password.as_bytes();
    if user.len() > 255 || pass.len() > 255 {
        return Err(NetError::invalid_argument("SOCKS credentials longer than 255 bytes"));
    }

    let mut request = Zeroizing::new(Vec::with_capacity(3 + user.len() + pass.len()));
    request.push(0x01);
    request.push(user.len() as u8);
    request.extend_from_slice(user);
    request.push(pass.len() as u8);
    request.extend_from_slice(pass);
    stream.write_all(&request).await.map_err(|_| NetError::SocksConnectionFailed)?;

    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await.map_err(|_| NetError::SocksConnectionFailed)?;
    if status[1] != 0x00 {
        return Err(NetError::SocksConnectionFailed);
    }
    Ok(())
}

async fn send_connect<S>(stream: &mut S, host: &str, port: u16) -> Result<(), NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = vec![SOCKS_VERSION, CMD_CONNECT, 0x00];
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    match literal.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            if host.is_empty() || host.len() > 255 {
                return Err(NetError::AddressInvalid);
            }
            request.push(ATYP_DOMAIN);
            request.push(host.len() as u8);
            request.extend_from_slice(host.as_bytes());
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await.map_err(|_| NetError::SocksConnectionFailed)
}

async fn read_reply<S>(stream: &mut S) -> Result<(), NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await.map_err(|_| NetError::SocksConnectionFailed)?;
    if head[0] != SOCKS_VERSION {
        return Err(NetError::SocksConnectionFailed);
    }

    match head[1] {
        0x00 => {}
        // network unreachable, host unreachable
        0x03 | 0x04 => return Err(NetError::SocksConnectionHostUnreachable),
        code => {
            tracing::debug!(code, "SOCKS proxy refused CONNECT");
            return Err(NetError::SocksConnectionFailed);
        }
    }

    // Drain BND.ADDR and BND.PORT.
    let addr_len = match head[3] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await.map_err(|_| NetError::SocksConnectionFailed)?;
            len[0] as usize
        }
        _ => return Err(NetError::SocksConnectionFailed),
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await.map_err(|_| NetError::SocksConnectionFailed)?;
    Ok(())
}
