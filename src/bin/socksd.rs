use anyhow::{Context, Result, bail};
use clap::Parser;
use socksd::{ProxyConfig, run_proxy};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "A standalone SOCKS5 proxy daemon", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "socksd.toml")]
    config: PathBuf,

    /// Listen address override (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Username for SOCKS5 proxy
    #[arg(short, long)]
    username: Option<String>,

    /// Password for SOCKS5 proxy
    #[arg(short, long)]
    password: Option<String>,

    /// Log file path ("stdout" for standard output)
    #[arg(long)]
    log: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Load config file, then let command-line flags take priority
    let mut config = ProxyConfig::load(&args.config)?;

    if let Some(listen) = args.listen {
        let (host, port) = listen
            .rsplit_once(':')
            .context("--listen must be host:port")?;
        config.host = host.to_string();
        config.port = port.parse().context("invalid port in --listen")?;
    }

    match (args.username, args.password) {
        (Some(u), Some(p)) => {
            config.user = Some(u);
            config.password = Some(p);
        }
        (None, None) => (),
        _ => bail!("must provide both username and password (or neither)"),
    }

    if let Some(log) = args.log {
        config.log_path = Some(log);
    }

    config.validate()?;

    init_logging(config.log_path.as_deref(), args.verbose)?;

    if config.credentials().is_some() {
        info!("authentication enabled");
    }

    // Run it
    info!("starting SOCKS5 proxy on {}", config.listen_addr());
    run_proxy(config).await?;
    Ok(())
}

/// init_logging points the tracing subscriber at stdout or an append-mode
/// log file, per config
fn init_logging(log_path: Option<&str>, verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    match log_path {
        None | Some("") | Some("stdout") => {
            tracing_subscriber::fmt().with_max_level(level).init();
        }
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {path}"))?;

            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
    }

    Ok(())
}
