//! `triad serve`: run the HTTP server.

use anyhow::{anyhow, Result};
use clap::Args;

use crate::adapters::http::{HttpServer, HttpServerConfig};
use crate::cli::service::{build_services, ServiceOptions};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind (defaults to server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (defaults to server.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve the built-in demo model and passages
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: ServeArgs, config: &Config, _json_mode: bool) -> Result<()> {
    let services = build_services(
        config,
        &ServiceOptions {
            dry_run: args.dry_run,
            ..ServiceOptions::default()
        },
    )?;

    let mut server_config = HttpServerConfig::from(config.server.clone());
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let server = HttpServer::new(server_config, services.coordinator, services.answerer, services.model);
    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| anyhow!("HTTP server failed: {e}"))
}
