use std::io;
use thiserror::Error;

/// ProxyError is the error taxonomy for the proxy. Only `Bind` and
/// `Config` are fatal to the daemon; every other variant is scoped to a
/// single session, which is logged and discarded while the listener
/// keeps serving.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Listener could not bind its address (address in use, permission denied)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or unexpected SOCKS5 bytes from the client
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Client offered no authentication method the server accepts
    #[error("no acceptable authentication method")]
    NoAcceptableMethod,

    /// Username/password sub-negotiation failed
    #[error("authentication failed for user {0:?}")]
    Auth(String),

    /// Command other than CONNECT
    #[error("unsupported command: {0:#04x}")]
    UnsupportedCommand(u8),

    /// Unknown ATYP byte in a request
    #[error("unsupported address type: {0:#04x}")]
    UnsupportedAddressType(u8),

    /// Domain name field was empty or not valid UTF-8
    #[error("invalid domain name: {0}")]
    InvalidDomain(String),

    /// Outbound connection to the target failed
    #[error("failed to dial {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Relay error
    #[error("relay error: {0}")]
    Relay(#[source] io::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
