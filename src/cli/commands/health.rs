//! `triad health`: probe the model backend.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::adapters::models::OllamaModelClient;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::domain::ports::{ModelClient, ModelHealth};

#[derive(Debug, Serialize)]
struct HealthOutput {
    host: String,
    model: String,
    #[serde(flatten)]
    health: ModelHealth,
}

impl CommandOutput for HealthOutput {
    fn to_human(&self) -> String {
        let status = if self.health.is_healthy() {
            console::style("healthy").green().bold()
        } else {
            console::style("unhealthy").red().bold()
        };
        let mut lines = vec![format!("Model backend {}: {status}", self.host)];
        lines.push(format!(
            "  Reachable: {}",
            if self.health.reachable { "yes" } else { "no" }
        ));
        lines.push(format!(
            "  Model '{}': {}",
            self.model,
            if self.health.model_available { "available" } else { "not pulled" }
        ));
        if !self.health.models.is_empty() {
            lines.push(format!("  Installed: {}", self.health.models.join(", ")));
        }
        lines.join("\n")
    }
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let client = OllamaModelClient::new(&config.model, &config.retry, &config.rate_limit)
        .context("Failed to create model client")?;
    let health = client.health_check().await.context("Health check failed")?;
    let healthy = health.is_healthy();

    output(
        &HealthOutput {
            host: config.model.host.clone(),
            model: config.model.name.clone(),
            health,
        },
        json_mode,
    );

    anyhow::ensure!(healthy, "Model backend is not ready");
    Ok(())
}
