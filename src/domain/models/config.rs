use serde::{Deserialize, Serialize};

/// Main configuration structure for triad
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Language model backend
    #[serde(default)]
    pub model: ModelConfig,

    /// Vector index backend
    #[serde(default)]
    pub index: IndexConfig,

    /// Sandbox for generated files
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Pipeline limits and timeouts
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Language model configuration (Ollama chat API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Chat model name
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call timeout in seconds
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_model_name() -> String {
    "qwen2.5-coder".to_string()
}

const fn default_temperature() -> f32 {
    0.2
}

const fn default_model_timeout() -> u64 {
    300
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            name: default_model_name(),
            temperature: default_temperature(),
            timeout_secs: default_model_timeout(),
        }
    }
}

/// Vector index configuration (Chroma with Ollama embeddings)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IndexConfig {
    /// Base URL of the Chroma server
    #[serde(default = "default_chroma_url")]
    pub chroma_url: String,

    /// Collection holding the knowledge base
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Embedding model served by Ollama
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Ollama host used for embeddings (defaults to `model.host`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_host: Option<String>,

    /// Passages requested per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Character budget of the rendered context block
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_chroma_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_collection() -> String {
    "local_rag".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

const fn default_top_k() -> usize {
    5
}

const fn default_max_context_chars() -> usize {
    6_000
}

const fn default_index_timeout() -> u64 {
    30
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chroma_url: default_chroma_url(),
            collection: default_collection(),
            embedding_model: default_embedding_model(),
            embedding_host: None,
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            timeout_secs: default_index_timeout(),
        }
    }
}

/// Sandbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceConfig {
    /// Directory all generated files must resolve under
    #[serde(default = "default_workspace_root")]
    pub root: String,
}

fn default_workspace_root() -> String {
    "workspace".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Overall deadline for one workflow run in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Caps applied to upstream outputs embedded in prompts
    #[serde(default)]
    pub prompt_limits: PromptLimits,
}

const fn default_request_timeout() -> u64 {
    900
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            prompt_limits: PromptLimits::default(),
        }
    }
}

/// Caps on upstream structured output embedded into later prompts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PromptLimits {
    #[serde(default = "default_max_components")]
    pub max_components: usize,

    #[serde(default = "default_max_requirements")]
    pub max_requirements: usize,

    #[serde(default = "default_max_acceptance_criteria")]
    pub max_acceptance_criteria: usize,

    /// Developer files shown to the tester
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Characters of each file's content shown to the tester
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,
}

const fn default_max_components() -> usize {
    10
}

const fn default_max_requirements() -> usize {
    20
}

const fn default_max_acceptance_criteria() -> usize {
    20
}

const fn default_max_files() -> usize {
    5
}

const fn default_max_file_chars() -> usize {
    1_500
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_components: default_max_components(),
            max_requirements: default_max_requirements(),
            max_acceptance_criteria: default_max_acceptance_criteria(),
            max_files: default_max_files(),
            max_file_chars: default_max_file_chars(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts for transient model failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Rate limiting configuration for model calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> f64 {
    5.0
}

const fn default_burst_size() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Whether to enable permissive CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_server_port() -> u16 {
    8000
}

const fn default_enable_cors() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            enable_cors: default_enable_cors(),
        }
    }
}

impl IndexConfig {
    /// Ollama host to use for query embeddings.
    pub fn embedding_host_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.embedding_host.as_deref().unwrap_or(fallback)
    }
}
