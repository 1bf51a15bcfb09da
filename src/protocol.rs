// RSV: Fields marked RESERVED (RSV) must be set to X'00'.
pub const RSV: u8 = 0x00;

// Version byte of the RFC 1929 username/password sub-negotiation
pub const AUTH_SUBNEGOTIATION_VERSION: u8 = 0x01;

/// Version represents available SOCKS proxy versions.
/// Only SOCKS5 is supported by this server.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Socks5 = 0x05,
}

/// AuthMethod represents available SOCKS5
/// authentication methods
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NoAuth = 0x00,
    // Gssapi = 0x01, not implemented
    UserPass = 0x02,
    // 0x03 - 0x7f: IANA reserved
    // 0x80 - 0xFE: private methods
    NoAcceptable = 0xFF,
}

/// AuthStatus represents the status byte of the RFC 1929
/// username/password sub-negotiation reply
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Success = 0x00,
    Failure = 0x01,
}

/// Command represents SOCKS5 protocol commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

/// Command implementation block
impl Command {
    /// from_byte converts a byte to its related SOCKS5 protocol command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Command::Connect),
            0x02 => Some(Command::Bind),
            0x03 => Some(Command::UdpAssociate),
            _ => None,
        }
    }
}

/// AddressType represents the SOCKS5 address types:
/// IPv4, Domain Name, IPv6
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    IPv4 = 0x01,
    DomainName = 0x03,
    IPv6 = 0x04,
}

/// AddressType implementation block
impl AddressType {
    /// from_byte converts a byte to its related network address type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(AddressType::IPv4),
            0x03 => Some(AddressType::DomainName),
            0x04 => Some(AddressType::IPv6),
            _ => None,
        }
    }
}

/// ReplyCode represents the SOCKS5 reply field values (RFC 1928 §6)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Succeeded = 0x00,
    ServerFailure = 0x01,
    ConnectionNotAllowed = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    // TtlExpired = 0x06, the proxy never originates this reply
    CommandNotSupported = 0x07,
    AddrTypeUnsupported = 0x08,
    // 0x09 - 0xFF: unassigned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_from_byte() {
        assert_eq!(Command::from_byte(0x01), Some(Command::Connect));
        assert_eq!(Command::from_byte(0x02), Some(Command::Bind));
        assert_eq!(Command::from_byte(0x03), Some(Command::UdpAssociate));
        assert_eq!(Command::from_byte(0x04), None);
    }

    #[test]
    fn address_type_from_byte() {
        assert_eq!(AddressType::from_byte(0x01), Some(AddressType::IPv4));
        assert_eq!(AddressType::from_byte(0x03), Some(AddressType::DomainName));
        assert_eq!(AddressType::from_byte(0x04), Some(AddressType::IPv6));
        assert_eq!(AddressType::from_byte(0x02), None);
    }
}
