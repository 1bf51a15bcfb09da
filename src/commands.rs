use crate::address;
use crate::error::ProxyError;
use crate::protocol::{AddressType, Command, RSV, ReplyCode, Version};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::info;

/// Connect holds the two established streams of a CONNECT session
pub struct Connect {
    pub inbound: TcpStream,
    pub outbound: TcpStream,
}

/// Connect implementation block
impl Connect {
    /// run relays bytes between client and target until either direction
    /// ends. The two copy loops are raced against each other: as soon as
    /// one returns end-of-stream or an error, both sockets are dropped,
    /// so a half-open peer cannot keep the session alive.
    pub async fn run(self) -> Result<(), ProxyError> {
        let (mut client_rd, mut client_wr) = self.inbound.into_split();
        let (mut target_rd, mut target_wr) = self.outbound.into_split();

        let result = tokio::select! {
            res = tokio::io::copy(&mut client_rd, &mut target_wr) => res.map(|n| ("client", n)),
            res = tokio::io::copy(&mut target_rd, &mut client_wr) => res.map(|n| ("target", n)),
        };

        // All four halves drop here, closing both sockets
        match result {
            Ok((side, bytes)) => {
                info!("relay closed by {side} after {bytes} bytes");
                Ok(())
            }
            Err(e) => Err(ProxyError::Relay(e)),
        }
    }
}

/// handle_socks_request checks the incoming request for SOCKS5 version number
/// and command, and routes the stream to the appropriate command handler.
/// Only CONNECT is implemented; BIND and UDP ASSOCIATE get the
/// command-not-supported reply before the session is closed.
pub async fn handle_socks_request<S>(
    stream: &mut S,
    dial_timeout: Duration,
) -> Result<TcpStream, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // SOCKS5 request format
    // +----+-----+-------+------+----------+----------+
    // |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
    // +----+-----+-------+------+----------+----------+
    // | 1  |  1  | X'00' |  1   | Variable |    2     |
    // +----+-----+-------+------+----------+----------+

    // Instantiate a request buffer & read
    let mut reqbuf = [0u8; 3];
    stream.read_exact(&mut reqbuf).await?;

    // Parse
    let version = reqbuf[0];
    let command = reqbuf[1];
    // Not retrieving RSV (RESERVED) -> 0x00

    // Ensure version is 0x05 -> SOCKS5
    if version != Version::Socks5 as u8 {
        return Err(ProxyError::Protocol(format!(
            "unsupported SOCKS version in request: {version:#04x}"
        )));
    }

    // Check command and route
    match Command::from_byte(command) {
        Some(Command::Connect) => handle_connect_cmd(stream, dial_timeout).await,
        Some(Command::Bind) | Some(Command::UdpAssociate) | None => {
            send_reply(stream, ReplyCode::CommandNotSupported, unspecified_addr()).await?;
            Err(ProxyError::UnsupportedCommand(command))
        }
    }
}

/// handle_connect_cmd parses the target address from a CONNECT request,
/// dials it within the configured timeout, and returns the outbound stream.
/// Every failure is answered with its matching SOCKS5 reply code before the
/// session is closed.
async fn handle_connect_cmd<S>(
    stream: &mut S,
    dial_timeout: Duration,
) -> Result<TcpStream, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Retrieve target from request
    let target = match address::read_target(stream).await {
        Ok(target) => target,
        Err(e) => {
            if let Some(code) = parse_failure_reply(&e) {
                // Best effort: the client may already be gone
                let _ = send_reply(stream, code, unspecified_addr()).await;
            }
            return Err(e);
        }
    };

    // Connect to target, bounded by the dial timeout
    match timeout(dial_timeout, TcpStream::connect(target.to_string())).await {
        Ok(Ok(outbound)) => {
            // Send OK reply echoing the bound local address
            send_reply(stream, ReplyCode::Succeeded, outbound.local_addr()?).await?;

            info!("connected to {target}");
            Ok(outbound)
        }
        Ok(Err(e)) => {
            let reply_code = match e.kind() {
                io::ErrorKind::ConnectionRefused => ReplyCode::ConnectionRefused,
                io::ErrorKind::HostUnreachable => ReplyCode::HostUnreachable,
                io::ErrorKind::NetworkUnreachable => ReplyCode::NetworkUnreachable,
                io::ErrorKind::PermissionDenied => ReplyCode::ConnectionNotAllowed,
                _ => ReplyCode::ServerFailure,
            };
            send_reply(stream, reply_code, unspecified_addr()).await?;
            Err(ProxyError::Dial {
                target: target.to_string(),
                source: e,
            })
        }
        Err(_) => {
            send_reply(stream, ReplyCode::HostUnreachable, unspecified_addr()).await?;
            Err(ProxyError::Dial {
                target: target.to_string(),
                source: io::Error::new(io::ErrorKind::TimedOut, "dial timed out"),
            })
        }
    }
}

/// send_reply handles logic for sending replies from the SOCKS server to
/// the client
pub async fn send_reply<S>(
    stream: &mut S,
    reply_code: ReplyCode,
    bound_addr: SocketAddr,
) -> Result<(), ProxyError>
where
    S: AsyncWrite + Unpin,
{
    // SOCKS5 reply format
    // +----+-----+-------+------+----------+----------+
    // |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
    // +----+-----+-------+------+----------+----------+
    // | 1  |  1  | X'00' |  1   | Variable |    2     |
    // +----+-----+-------+------+----------+----------+

    // Build initial reply vec
    let mut reply = vec![Version::Socks5 as u8, reply_code as u8, RSV];

    // Parse bound_addr as IPv4/6 and finish build accordingly
    match bound_addr {
        SocketAddr::V4(addr) => {
            reply.push(AddressType::IPv4 as u8);
            reply.extend_from_slice(&addr.ip().octets());
            reply.extend_from_slice(&addr.port().to_be_bytes());
        }
        SocketAddr::V6(addr) => {
            reply.push(AddressType::IPv6 as u8);
            reply.extend_from_slice(&addr.ip().octets());
            reply.extend_from_slice(&addr.port().to_be_bytes());
        }
    }

    // Write reply
    stream.write_all(&reply).await?;
    Ok(())
}

/// parse_failure_reply maps a request-parsing error to the reply code sent
/// before closing. Plain I/O errors mean the client hung up, so no reply
/// is attempted for those.
fn parse_failure_reply(err: &ProxyError) -> Option<ReplyCode> {
    match err {
        ProxyError::UnsupportedAddressType(_) => Some(ReplyCode::AddrTypeUnsupported),
        ProxyError::Io(_) => None,
        _ => Some(ReplyCode::ServerFailure),
    }
}

fn unspecified_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
}
