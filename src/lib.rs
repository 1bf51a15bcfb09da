//! A standalone SOCKS5 proxy daemon
//!
//! ## SOCKS5 Implementation
//!
//! - Features:
//!     - CONNECT with a bounded outbound dial timeout
//!     - No Authentication
//!     - Username/Password Authentication
//!     - Async using tokio with one isolated task per session
//!     - TOML config file with CLI overrides, log redirection to a file
//! - [SOCKS5 (RFC 1928)](https://datatracker.ietf.org/doc/html/rfc1928)
//! - [Username/Password Authentication (RFC 1929)](https://datatracker.ietf.org/doc/html/rfc1929)
//!
//! BIND and UDP ASSOCIATE are answered with the command-not-supported reply.
//!
//! # Example
//! ```no_run
//! use socksd::{ProxyConfig, run_proxy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProxyConfig::load("socksd.toml")?;
//!     run_proxy(config).await?;
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;

// Re-export main types at crate root for convenience
pub use auth::UserPass;
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use protocol::{AddressType, AuthMethod, Command, ReplyCode, Version};
pub use server::{Socks5Server, run_proxy};
