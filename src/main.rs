use anyhow::Context;
use clap::{Parser, ValueEnum};
use spidey::{
    limits::{Concurrency, ConnLimits, ServerLimits},
    socket_listen, Config, MimeTypes, Server, DEFAULT_BACKLOG, DEFAULT_MIME_TYPE,
    DEFAULT_MIME_TYPES_PATH, DEFAULT_PORT, DEFAULT_ROOT,
};
use std::{path::PathBuf, time::Duration};
use tracing_subscriber::EnvFilter;

/// Minimal HTTP/1.0 server for static files, directory listings and CGI scripts.
#[derive(Debug, Parser)]
#[command(name = "spidey", version)]
struct Cli {
    /// Concurrency mode
    #[arg(short = 'c', long, value_enum, default_value_t = Mode::Pool)]
    concurrency: Mode,

    /// Path to the mime.types table
    #[arg(short = 'm', long, default_value = DEFAULT_MIME_TYPES_PATH)]
    mime_types: PathBuf,

    /// Content type for unknown extensions
    #[arg(short = 'M', long, default_value = DEFAULT_MIME_TYPE)]
    default_mimetype: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Document root
    #[arg(short = 'r', long, default_value = DEFAULT_ROOT)]
    root: PathBuf,

    /// Number of workers in pool mode
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Connections allowed to wait for a worker
    #[arg(long)]
    pending: Option<usize>,

    /// Seconds to wait for each request line
    #[arg(long)]
    read_timeout: Option<u64>,

    /// Seconds allowed for each write to the client
    #[arg(long)]
    write_timeout: Option<u64>,

    /// Seconds a CGI script may run
    #[arg(long)]
    cgi_timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Serve one connection at a time
    Single,
    /// Serve connections from a bounded pool of workers
    #[value(alias = "forking")]
    Pool,
}

impl Cli {
    fn server_limits(&self) -> ServerLimits {
        let defaults = ServerLimits::default();

        ServerLimits {
            concurrency: match self.concurrency {
                Mode::Single => Concurrency::Sequential,
                Mode::Pool => Concurrency::Pooled,
            },
            max_workers: self.workers.unwrap_or(defaults.max_workers),
            max_pending_connections: self.pending.unwrap_or(defaults.max_pending_connections),
            ..defaults
        }
    }

    fn connection_limits(&self) -> ConnLimits {
        let defaults = ConnLimits::default();
        let secs = |value: Option<u64>, default| value.map_or(default, Duration::from_secs);

        ConnLimits {
            socket_read_timeout: secs(self.read_timeout, defaults.socket_read_timeout),
            socket_write_timeout: secs(self.write_timeout, defaults.socket_write_timeout),
            cgi_timeout: secs(self.cgi_timeout, defaults.cgi_timeout),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mime_types = match MimeTypes::load(&cli.mime_types, cli.default_mimetype.as_str()) {
        Ok(mime_types) => mime_types,
        Err(e) => {
            tracing::warn!(
                "Cannot read {}: {e}; every file will be served as {}",
                cli.mime_types.display(),
                cli.default_mimetype
            );
            MimeTypes::new(cli.default_mimetype.as_str())
        }
    };

    let config = Config::new(&cli.root, cli.port, mime_types)
        .with_context(|| format!("invalid document root {}", cli.root.display()))?;
    let listener = socket_listen(cli.port, DEFAULT_BACKLOG)
        .with_context(|| format!("cannot listen on port {}", cli.port))?;

    tracing::info!(
        "Listening on port {} serving {}",
        cli.port,
        config.root().display()
    );
    tracing::debug!(?cli, "Configuration");

    Server::builder()
        .listener(listener)
        .config(config)
        .server_limits(cli.server_limits())
        .connection_limits(cli.connection_limits())
        .build()
        .launch()
        .await;

    Ok(())
}
