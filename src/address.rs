use crate::error::ProxyError;
use crate::protocol::AddressType;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// TargetAddr is the destination of a SOCKS5 request: an IP socket address
/// or a domain name plus port. Domains are resolved by the system resolver
/// at dial time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    Ip(SocketAddr),
    Domain(String, u16),
}

/// TargetAddr implementation block
impl TargetAddr {
    /// addr_type returns the SOCKS5 address type this target was sent as
    pub fn addr_type(&self) -> AddressType {
        match self {
            TargetAddr::Ip(SocketAddr::V4(_)) => AddressType::IPv4,
            TargetAddr::Ip(SocketAddr::V6(_)) => AddressType::IPv6,
            TargetAddr::Domain(_, _) => AddressType::DomainName,
        }
    }

    /// port returns the destination port
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{addr}"),
            TargetAddr::Domain(domain, port) => write!(f, "{domain}:{port}"),
        }
    }
}

/// read_target parses the ATYP, DST.ADDR, and DST.PORT fields of a SOCKS5
/// request from the stream: IPv4, IPv6, or domain name
pub async fn read_target<S>(stream: &mut S) -> Result<TargetAddr, ProxyError>
where
    S: AsyncRead + Unpin,
{
    // Read address type byte from stream
    let mut atype = [0u8; 1];
    stream.read_exact(&mut atype).await?;

    let addr_type =
        AddressType::from_byte(atype[0]).ok_or(ProxyError::UnsupportedAddressType(atype[0]))?;

    // Match type and extract address or domain name
    let target = match addr_type {
        AddressType::IPv4 => {
            let mut addr = [0u8; 4];
            stream.read_exact(&mut addr).await?;
            let ip = Ipv4Addr::from(addr);

            let port = read_port(stream).await?;
            TargetAddr::Ip(SocketAddr::from((ip, port)))
        }
        AddressType::DomainName => {
            // First octet in DomainName contains the number of
            // octets to follow
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;

            if len[0] == 0 {
                return Err(ProxyError::InvalidDomain(
                    "domain length cannot be 0".to_string(),
                ));
            }

            // Read domain and convert to string
            let mut domain = vec![0u8; len[0] as usize];
            stream.read_exact(&mut domain).await?;
            let domain = String::from_utf8(domain)
                .map_err(|e| ProxyError::InvalidDomain(e.to_string()))?;

            let port = read_port(stream).await?;
            TargetAddr::Domain(domain, port)
        }
        AddressType::IPv6 => {
            let mut addr = [0u8; 16];
            stream.read_exact(&mut addr).await?;
            let ip = Ipv6Addr::from(addr);

            let port = read_port(stream).await?;
            TargetAddr::Ip(SocketAddr::from((ip, port)))
        }
    };

    Ok(target)
}

/// read_port reads the two-byte destination port in network order
async fn read_port<S>(stream: &mut S) -> Result<u16, ProxyError>
where
    S: AsyncRead + Unpin,
{
    let mut port_buf = [0u8; 2];
    stream.read_exact(&mut port_buf).await?;
    Ok(u16::from_be_bytes(port_buf))
}
