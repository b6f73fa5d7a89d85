//! TLink daemon - accepts alarm-panel connections and keeps sessions
//! alive.

use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing::info;

use tlink::config::{init_logging, Config};
use tlink::error::Result;
use tlink::server::PanelServer;
use tlink::VERSION;

/// TLink - session server for the TLink/ITv2 panel protocol.
#[derive(Parser, Debug)]
#[command(name = "tlinkd", version, about)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "tlink.toml")]
    config: PathBuf,

    /// Override the configured listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(port) = cli.port {
        config.server.listen_port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config.logging)?;
    info!(version = VERSION, port = config.server.listen_port, "tlinkd starting");

    let server = PanelServer::new(config);
    let shutdown = server.shutdown_token();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    server.run().await
}
