//! Ollama chat model client.
//!
//! Calls `POST {host}/api/chat` with streaming disabled. Transient failures
//! (connection problems, 5xx, 429) are retried with exponential backoff and
//! every attempt passes through a token bucket rate limiter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::domain::errors::ModelError;
use crate::domain::models::{ModelConfig, RateLimitConfig, RetryConfig};
use crate::domain::ports::{ModelClient, ModelHealth};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// [`ModelClient`] backed by a local Ollama server.
pub struct OllamaModelClient {
    http: Client,
    host: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    retry: RetryConfig,
    limiter: DirectLimiter,
}

impl OllamaModelClient {
    /// Build a client from configuration.
    pub fn new(model: &ModelConfig, retry: &RetryConfig, rate_limit: &RateLimitConfig) -> Result<Self> {
        let timeout = Duration::from_secs(model.timeout_secs);
        let http = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            host: model.host.trim_end_matches('/').to_string(),
            model: model.name.clone(),
            temperature: model.temperature,
            timeout,
            retry: retry.clone(),
            limiter: RateLimiter::direct(quota(rate_limit)?),
        })
    }

    /// One chat request, no retry.
    async fn chat_once(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ModelError> {
        self.limiter.until_ready().await;

        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user_prompt,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .http
            .post(format!("{}/api/chat", self.host))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.map_status(status, body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("undecodable chat response: {e}")))?;
        Ok(chat.message.content)
    }

    fn map_transport_error(&self, err: &reqwest::Error) -> ModelError {
        if err.is_timeout() {
            ModelError::Timeout(self.timeout.as_secs())
        } else {
            ModelError::Unavailable(format!("{}: {err}", self.host))
        }
    }

    fn map_status(&self, status: StatusCode, body: String) -> ModelError {
        match status {
            StatusCode::NOT_FOUND => {
                ModelError::NotConfigured(format!("model '{}' not available: {body}", self.model))
            }
            StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited(body),
            s if s.is_server_error() => ModelError::Unavailable(format!("HTTP {s}: {body}")),
            s => ModelError::InvalidResponse(format!("HTTP {s}: {body}")),
        }
    }

    fn backoff_policy(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.retry.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build()
    }
}

fn quota(config: &RateLimitConfig) -> Result<Quota> {
    let burst = NonZeroU32::new(config.burst_size).context("rate_limit.burst_size must be positive")?;
    anyhow::ensure!(
        config.requests_per_second.is_finite() && config.requests_per_second > 0.0,
        "rate_limit.requests_per_second must be positive"
    );
    let period = Duration::try_from_secs_f64(1.0 / config.requests_per_second).with_context(|| {
        format!(
            "rate_limit.requests_per_second {} is too small",
            config.requests_per_second
        )
    })?;
    let quota = Quota::with_period(period).context("rate limit period must be non-zero")?;
    Ok(quota.allow_burst(burst))
}

#[async_trait]
impl ModelClient for OllamaModelClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ModelError> {
        let attempts = AtomicU32::new(0);
        let max_retries = self.retry.max_retries;

        backoff::future::retry(self.backoff_policy(), || {
            let attempts = &attempts;
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                match self.chat_once(system_prompt, user_prompt).await {
                    Ok(text) => {
                        debug!(attempt, chars = text.len(), "Chat completed");
                        Ok(text)
                    }
                    Err(e) if e.is_transient() && attempt < max_retries => {
                        warn!(attempt, error = %e, "Transient model error, retrying");
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    async fn health_check(&self) -> Result<ModelHealth, ModelError> {
        let response = match self.http.get(format!("{}/api/tags", self.host)).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Ok(ModelHealth {
                    reachable: false,
                    model_available: false,
                    models: Vec::new(),
                })
            }
            Err(e) => return Err(self.map_transport_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.map_status(status, body));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("undecodable tags response: {e}")))?;
        let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        let model_available = models
            .iter()
            .any(|name| name == &self.model || name.starts_with(&format!("{}:", self.model)));

        Ok(ModelHealth {
            reachable: true,
            model_available,
            models,
        })
    }
}
