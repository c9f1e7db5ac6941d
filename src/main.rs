//! Emby image gate entry point.

use anyhow::{Context, Result};
use clap::Parser;

use emby_image_gate::cli::{redacted_yaml, Cli};
use emby_image_gate::infrastructure::config::ConfigLoader;
use emby_image_gate::infrastructure::logging::{LogConfig, LoggerImpl};
use emby_image_gate::infrastructure::server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(cli.config.as_deref()).context("Invalid configuration")?;
    cli.apply_overrides(&mut config);

    if cli.check_config {
        print!("{}", redacted_yaml(&config)?);
        return Ok(());
    }

    let _logger = LoggerImpl::init(&LogConfig::from_config(&config)?)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %config.backend.base_url,
        route_prefix = %config.backend.route_prefix,
        cache_ttl = %config.cache.ttl,
        tls = config.server.tls.is_some(),
        "starting emby image gate"
    );

    server::serve(&config).await
}
