use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_aggregator::{
    config::Config,
    services::StreamCatalog,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "m3u-aggregator")]
#[command(version)]
#[command(about = "Aggregates M3U playlists into validated channel groups and serves them as JSON")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Directory scanned for .m3u/.m3u8 playlists
    #[arg(short = 's', long, value_name = "DIR")]
    streams_dir: Option<PathBuf>,

    /// Cache file written by resync
    #[arg(long, value_name = "FILE")]
    cache_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("m3u_aggregator={},tower_http=trace", cli.log_level)
    } else {
        format!("m3u_aggregator={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting M3U Aggregator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(streams_dir) = cli.streams_dir {
        config.storage.streams_dir = streams_dir;
    }
    if let Some(cache_file) = cli.cache_file {
        config.storage.cache_file = cache_file;
    }

    info!(
        "Playlists from {:?}, cache at {:?}, {} validation workers",
        config.storage.streams_dir, config.storage.cache_file, config.validation.workers
    );

    let catalog = StreamCatalog::from_config(&config)?;
    match catalog.store().load().await {
        Ok(Some(cached)) => info!("Existing cache holds {} streams", cached.record_count()),
        Ok(None) => info!("No stream cache yet, first read will aggregate"),
        Err(e) => warn!("Existing stream cache is unusable: {}", e),
    }
    let web_server = WebServer::new(AppState::new(config, catalog))?;

    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve().await?;

    Ok(())
}
