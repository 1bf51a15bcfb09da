use crate::{
    auth::{self, UserPass},
    commands::{self, Connect},
    config::ProxyConfig,
    error::ProxyError,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Socks5Server represents a SOCKS5 server and houses related
/// configuration data
pub struct Socks5Server {
    pub listen_addr: String,
    auth_config: Option<Arc<UserPass>>,
    dial_timeout: Duration,
    listener: Option<TcpListener>,
}

/// Socks5Server implementation block
impl Socks5Server {
    /// new is a constructor for the Socks5Server type
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            auth_config: None,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            listener: None,
        }
    }

    /// with_auth applies the desired authentication
    pub fn with_auth(mut self, auth: Option<UserPass>) -> Self {
        // Arc allows shared ownership of UserPass across session tasks
        self.auth_config = auth.map(Arc::new);
        self
    }

    /// with_dial_timeout bounds outbound dials to request targets
    pub fn with_dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self
    }

    /// bind to the listen address, panics when called twice
    pub async fn bind(&mut self) -> Result<SocketAddr, ProxyError> {
        if self.listener.is_some() {
            panic!("bind can only be called once");
        }

        // Instantiate tokio listener; a bind failure is fatal
        let listener =
            TcpListener::bind(&self.listen_addr)
                .await
                .map_err(|e| ProxyError::Bind {
                    addr: self.listen_addr.clone(),
                    source: e,
                })?;
        let addr = listener.local_addr()?;

        info!("SOCKS5 proxy listening on {addr}");

        self.listener = Some(listener);
        Ok(addr)
    }

    /// run handles server spinup and listens for incoming connections.
    /// It blocks until the listener fails; per-session errors are logged
    /// and never reach the accept loop.
    pub async fn run(&mut self) -> Result<(), ProxyError> {
        if self.listener.is_none() {
            self.bind().await?;
        }
        let listener = self.listener.take().unwrap();

        // Listen for connections to proxy
        loop {
            // Accept incoming connection
            let (inbound, peer_addr) = listener.accept().await?;

            // Clone for this connection
            let auth_config = self.auth_config.clone();
            let dial_timeout = self.dial_timeout;

            // Spawn async task: one isolated session per connection
            tokio::spawn(async move {
                info!("new client: {peer_addr}");

                if let Err(e) = handle_connection(inbound, auth_config, dial_timeout).await {
                    error!("session error from {peer_addr}: {e}");
                }
            });
        }
    }
}

/// run_proxy is the daemon entry point: it builds a server from the config
/// and blocks until the listener fails or the process is terminated
pub async fn run_proxy(config: ProxyConfig) -> Result<(), ProxyError> {
    config.validate()?;

    let mut server = Socks5Server::new(config.listen_addr())
        .with_auth(config.credentials())
        .with_dial_timeout(config.dial_timeout());

    server.run().await
}

/// handle_connection handles the full client/server SOCKS5 protocol flow
/// for one session: negotiate, handle the request, then relay
async fn handle_connection(
    mut stream: TcpStream,
    auth_config: Option<Arc<UserPass>>,
    dial_timeout: Duration,
) -> Result<(), ProxyError> {
    // Negotiate authentication with client
    auth::negotiate_auth(&mut stream, &auth_config).await?;

    // Handle connection request from client
    let outbound = commands::handle_socks_request(&mut stream, dial_timeout).await?;

    // Relay between the streams until either side closes
    let connect = Connect {
        inbound: stream,
        outbound,
    };
    connect.run().await
}
