//! triad CLI entry point.

use clap::Parser;

use triad::cli::{handle_error, load_config, run, Cli};
use triad::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, json_mode),
    };

    let _logger = match LogConfig::try_from(&config.logging)
        .map_err(anyhow::Error::from)
        .and_then(|log| LoggerImpl::init(&log))
    {
        Ok(logger) => logger,
        Err(err) => handle_error(err, json_mode),
    };

    if let Err(err) = run(cli, config).await {
        handle_error(err, json_mode);
    }
}
