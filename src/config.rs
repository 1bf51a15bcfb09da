use crate::auth::UserPass;
use crate::error::ProxyError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1080
}

fn default_dial_timeout_secs() -> u64 {
    10
}

/// ProxyConfig holds the daemon configuration: listen address, optional
/// username/password credentials, log destination, and the outbound dial
/// timeout. Loaded from a TOML file; every field has a default so the
/// daemon runs with no config file at all.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProxyConfig {
    /// Listen host
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Username for client authentication
    pub user: Option<String>,

    /// Password for client authentication
    pub password: Option<String>,

    /// Log destination: "stdout" (or unset) for standard output,
    /// otherwise a file path opened in append mode
    pub log_path: Option<String>,

    /// Timeout for outbound dials to request targets, in seconds
    pub dial_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: None,
            password: None,
            log_path: None,
            dial_timeout_secs: default_dial_timeout_secs(),
        }
    }
}

/// ProxyConfig implementation block
impl ProxyConfig {
    /// load reads and parses a TOML config file. A missing file is not an
    /// error: the daemon runs on defaults, so a bare `socksd` invocation
    /// works without any setup.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProxyError> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ProxyError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// validate checks the config invariants: a usable port, and user and
    /// password set together. An empty user and password pair counts as
    /// unset and selects no-auth mode.
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.port == 0 {
            return Err(ProxyError::Config(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        let user_set = self.user.as_deref().is_some_and(|u| !u.is_empty());
        let password_set = self.password.as_deref().is_some_and(|p| !p.is_empty());

        if user_set != password_set {
            return Err(ProxyError::Config(
                "user and password must be set together (or neither)".to_string(),
            ));
        }

        Ok(())
    }

    /// credentials returns the configured username/password pair, or None
    /// when the server should run in no-auth mode
    pub fn credentials(&self) -> Option<UserPass> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some(UserPass {
                    username: user.to_string(),
                    password: password.to_string(),
                })
            }
            _ => None,
        }
    }

    /// listen_addr formats the host and port for the listener bind
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// dial_timeout returns the outbound dial timeout as a Duration
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_file_missing() {
        let config = ProxyConfig::load("/nonexistent/socksd.toml").unwrap();
        assert_eq!(config.listen_addr(), "localhost:1080");
        assert!(config.credentials().is_none());
    }

    #[test]
    fn parse_minimal_config() {
        let config: ProxyConfig = toml::from_str(
            r#"
host = "0.0.0.0"
port = 1090
"#,
        )
        .unwrap();

        assert_eq!(config.listen_addr(), "0.0.0.0:1090");
        assert!(config.credentials().is_none());
        assert_eq!(config.dial_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn parse_full_config() {
        let config: ProxyConfig = toml::from_str(
            r#"
host = "127.0.0.1"
port = 1080
user = "alice"
password = "hunter2"
log_path = "/var/log/socksd.log"
dial_timeout_secs = 5
"#,
        )
        .unwrap();

        config.validate().unwrap();
        let creds = config.credentials().unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "hunter2");
        assert_eq!(config.log_path.as_deref(), Some("/var/log/socksd.log"));
        assert_eq!(config.dial_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn user_without_password_rejected() {
        let config: ProxyConfig = toml::from_str(r#"user = "alice""#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_credentials_mean_no_auth() {
        let config: ProxyConfig = toml::from_str(
            r#"
user = ""
password = ""
"#,
        )
        .unwrap();

        config.validate().unwrap();
        assert!(config.credentials().is_none());
    }

    #[test]
    fn zero_port_rejected() {
        let config: ProxyConfig = toml::from_str("port = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"10.0.0.1\"\nport = 9050").unwrap();

        let config = ProxyConfig::load(file.path()).unwrap();
        assert_eq!(config.listen_addr(), "10.0.0.1:9050");
        assert_eq!(config.port, 9050);
    }
}
