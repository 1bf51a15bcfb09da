use crate::error::ProxyError;
use crate::protocol::{AUTH_SUBNEGOTIATION_VERSION, AuthMethod, AuthStatus, Version};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

/// UserPass holds the username/password credentials configured
/// server-side. Immutable after load; sessions share it read-only.
#[derive(Debug, Clone)]
pub struct UserPass {
    pub username: String,
    pub password: String,
}

/// UserPass implementation block
impl UserPass {
    /// validate checks a client-supplied pair against the configured
    /// credentials
    pub fn validate(&self, username: &str, password: &str) -> bool {
        if username == self.username && password == self.password {
            return true;
        }

        warn!("authentication failed: bad username or password for {username:?}");
        false
    }
}

/// negotiate_auth handles authentication negotiation between the SOCKS server
/// and client, and returns the method that was negotiated. A version mismatch
/// closes the connection without any reply; an unacceptable method set gets
/// the 0xFF reply before the connection is closed.
pub async fn negotiate_auth<S>(
    stream: &mut S,
    auth_config: &Option<Arc<UserPass>>,
) -> Result<AuthMethod, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // ClientHello format
    // +----+----------+----------+
    // |VER | NMETHODS | METHODS  |
    // +----+----------+----------+
    // | 1  |    1     | 1 to 255 |
    // +----+----------+----------+

    // Instantiate handshake buffer & read
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await?;

    // Parse version and client methods from handshake
    let version = buf[0];
    let n_methods = buf[1];

    // Ensure version is 0x05 -> SOCKS5
    if version != Version::Socks5 as u8 {
        return Err(ProxyError::Protocol(format!(
            "unsupported SOCKS version: {version:#04x}"
        )));
    }

    // Read the methods the client offered
    let mut methods = vec![0u8; n_methods as usize];
    stream.read_exact(&mut methods).await?;

    // Retrieve desired method
    let method = select_auth_method(&methods, auth_config.is_some());

    // ServerChoice method selection reply format
    // +----+--------+
    // |VER | METHOD |
    // +----+--------+
    // | 1  |   1    |
    // +----+--------+

    // Write response to client with selected method
    stream
        .write_all(&[Version::Socks5 as u8, method as u8])
        .await?;

    // Route to appropriate auth handler
    match method {
        AuthMethod::UserPass => {
            let creds = auth_config.as_ref().ok_or_else(|| {
                ProxyError::Protocol("username/password selected but not configured".to_string())
            })?;
            authenticate_userpass(stream, creds).await?;
        }
        AuthMethod::NoAuth => (),
        _ => return Err(ProxyError::NoAcceptableMethod),
    }

    Ok(method)
}

/// authenticate_userpass handles username/password authentication according
/// to RFC 1929. On a credential mismatch the failure status byte is written
/// before the session is torn down; there is no retry.
async fn authenticate_userpass<S>(stream: &mut S, server_creds: &UserPass) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Client Username/Password Request
    // +----+------+----------+------+----------+
    // |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
    // +----+------+----------+------+----------+
    // | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
    // +----+------+----------+------+----------+

    // Get subnegotiation version -> 0x01 expected
    let mut ver = [0u8; 1];
    stream.read_exact(&mut ver).await?;

    // Check version number
    if ver[0] != AUTH_SUBNEGOTIATION_VERSION {
        return Err(ProxyError::Protocol(format!(
            "invalid username/password subnegotiation version: {:#04x}",
            ver[0]
        )));
    }

    // Instantiate buffer & read username length
    let mut username_len = [0u8; 1];
    stream.read_exact(&mut username_len).await?;

    // Read username
    let mut username = vec![0u8; username_len[0] as usize];
    stream.read_exact(&mut username).await?;

    // Read password length
    let mut password_len = [0u8; 1];
    stream.read_exact(&mut password_len).await?;

    // Read password
    let mut password = vec![0u8; password_len[0] as usize];
    stream.read_exact(&mut password).await?;

    // Convert username/password to String for comparison
    let username = String::from_utf8(username)
        .map_err(|_| ProxyError::Protocol("username is not valid UTF-8".to_string()))?;
    let password = String::from_utf8(password)
        .map_err(|_| ProxyError::Protocol("password is not valid UTF-8".to_string()))?;

    // Validate credentials
    let status = if server_creds.validate(&username, &password) {
        AuthStatus::Success
    } else {
        AuthStatus::Failure
    };

    // Username/Password Server response
    // +----+--------+
    // |VER | STATUS |
    // +----+--------+
    // | 1  |   1    |
    // +----+--------+

    // Write status reply to client
    stream
        .write_all(&[AUTH_SUBNEGOTIATION_VERSION, status as u8])
        .await?;

    // Validate authentication status
    match status {
        AuthStatus::Success => Ok(()),
        AuthStatus::Failure => Err(ProxyError::Auth(username)),
    }
}

/// select_auth_method picks the method the server answers with. When
/// credentials are configured only username/password is acceptable;
/// otherwise only no-auth is offered back.
fn select_auth_method(client_methods: &[u8], auth_required: bool) -> AuthMethod {
    let wanted = if auth_required {
        AuthMethod::UserPass
    } else {
        AuthMethod::NoAuth
    };

    if client_methods.contains(&(wanted as u8)) {
        wanted
    } else {
        AuthMethod::NoAcceptable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn creds() -> Option<Arc<UserPass>> {
        Some(Arc::new(UserPass {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        }))
    }

    #[test]
    fn validate_matches_configured_pair() {
        let creds = UserPass {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(creds.validate("alice", "hunter2"));
        assert!(!creds.validate("alice", "wrong"));
        assert!(!creds.validate("bob", "hunter2"));
    }

    #[test]
    fn method_selection() {
        // No-auth mode only ever answers no-auth
        assert_eq!(select_auth_method(&[0x00], false), AuthMethod::NoAuth);
        assert_eq!(select_auth_method(&[0x00, 0x02], false), AuthMethod::NoAuth);
        assert_eq!(select_auth_method(&[0x02], false), AuthMethod::NoAcceptable);

        // With credentials configured only username/password is acceptable
        assert_eq!(
            select_auth_method(&[0x00, 0x02], true),
            AuthMethod::UserPass
        );
        assert_eq!(select_auth_method(&[0x00], true), AuthMethod::NoAcceptable);
        assert_eq!(select_auth_method(&[], true), AuthMethod::NoAcceptable);
    }

    #[tokio::test]
    async fn no_auth_selected_without_credential_store() {
        let (mut client, mut server) = duplex(64);

        // Greeting offering no-auth only
        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();

        let method = negotiate_auth(&mut server, &None).await.unwrap();
        assert_eq!(method, AuthMethod::NoAuth);

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0x00]);
    }

    #[tokio::test]
    async fn userpass_subnegotiation_succeeds() {
        let (mut client, mut server) = duplex(64);

        // Greeting plus the full RFC 1929 exchange, written up front
        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
        client.write_all(&[0x01, 5]).await.unwrap();
        client.write_all(b"alice").await.unwrap();
        client.write_all(&[7]).await.unwrap();
        client.write_all(b"hunter2").await.unwrap();

        let method = negotiate_auth(&mut server, &creds()).await.unwrap();
        assert_eq!(method, AuthMethod::UserPass);

        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0x02, 0x01, 0x00]);
    }

    #[tokio::test]
    async fn userpass_mismatch_fails_after_status_byte() {
        let (mut client, mut server) = duplex(64);

        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
        client.write_all(&[0x01, 5]).await.unwrap();
        client.write_all(b"alice").await.unwrap();
        client.write_all(&[5]).await.unwrap();
        client.write_all(b"wrong").await.unwrap();

        let err = negotiate_auth(&mut server, &creds()).await.unwrap_err();
        assert!(matches!(err, ProxyError::Auth(user) if user == "alice"));

        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0x02, 0x01, 0x01]);
    }

    #[tokio::test]
    async fn version_mismatch_gets_no_reply() {
        let (mut client, mut server) = duplex(64);

        client.write_all(&[0x04, 0x01, 0x00]).await.unwrap();

        let err = negotiate_auth(&mut server, &None).await.unwrap_err();
        assert!(matches!(err, ProxyError::Protocol(_)));

        // Server must not have written anything
        drop(server);
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn no_acceptable_method_replied_with_0xff() {
        let (mut client, mut server) = duplex(64);

        // Client only offers no-auth while credentials are required
        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();

        let err = negotiate_auth(&mut server, &creds()).await.unwrap_err();
        assert!(matches!(err, ProxyError::NoAcceptableMethod));

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0xFF]);
    }
}
