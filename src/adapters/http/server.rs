//! Code generation HTTP server.
//!
//! Exposes the pipeline, question answering and the sandbox inventory over
//! JSON. Workflow failures are reported inside the `WorkflowResult` body with
//! status 200; only malformed requests and infrastructure errors use error
//! status codes.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domain::models::{ServerConfig, WorkflowResult, WorkspaceInventory};
use crate::domain::ports::{ModelClient, ModelHealth};
use crate::services::{Answer, AskError, MultiAgentCoordinator, QuestionAnswerer};

const SERVICE_NAME: &str = "triad";

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        ServerConfig::default().into()
    }
}

impl From<ServerConfig> for HttpServerConfig {
    fn from(config: ServerConfig) -> Self {
        Self {
            host: config.host,
            port: config.port,
            enable_cors: config.enable_cors,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateCodeRequest {
    pub instruction: String,
    #[serde(default)]
    pub apply: bool,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub agents: Vec<&'static str>,
    pub endpoints: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub index: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_health: Option<ModelHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

struct AppState {
    coordinator: MultiAgentCoordinator,
    answerer: QuestionAnswerer,
    model: Arc<dyn ModelClient>,
}

/// HTTP front end for the pipeline.
pub struct HttpServer {
    config: HttpServerConfig,
    coordinator: MultiAgentCoordinator,
    answerer: QuestionAnswerer,
    model: Arc<dyn ModelClient>,
}

impl HttpServer {
    pub fn new(
        config: HttpServerConfig,
        coordinator: MultiAgentCoordinator,
        answerer: QuestionAnswerer,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            config,
            coordinator,
            answerer,
            model,
        }
    }

    /// Build the router.
    pub fn build_router(self) -> Router {
        let enable_cors = self.config.enable_cors;
        let state = Arc::new(AppState {
            coordinator: self.coordinator,
            answerer: self.answerer,
            model: self.model,
        });

        let app = Router::new()
            .route("/", get(service_info))
            .route("/health", get(health_check))
            .route("/generate_code", post(generate_code))
            .route("/ask", post(ask))
            .route("/workspace/info", get(workspace_info))
            .with_state(state);

        if enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.config.host, self.config.port).parse()
    }

    /// Start the server.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("HTTP server listening on {}", addr);

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// Handler functions

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        agents: vec!["product_manager", "developer", "tester"],
        endpoints: vec!["/health", "/generate_code", "/ask", "/workspace/info"],
    })
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut response = HealthResponse {
        status: "degraded",
        model: state.coordinator.model_id().to_string(),
        index: state.coordinator.index_name().to_string(),
        model_health: None,
        error: None,
    };

    match state.model.health_check().await {
        Ok(health) => {
            if health.is_healthy() {
                response.status = "healthy";
            }
            response.model_health = Some(health);
        }
        Err(e) => response.error = Some(e.to_string()),
    }
    Json(response)
}

async fn generate_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateCodeRequest>,
) -> Result<Json<WorkflowResult>, ApiError> {
    let instruction = req.instruction.trim();
    if instruction.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "EMPTY_INSTRUCTION", "Instruction is empty"));
    }

    Ok(Json(state.coordinator.generate_code(instruction, req.apply).await))
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, ApiError> {
    match state.answerer.ask(&req.question).await {
        Ok(answer) => Ok(Json(answer)),
        Err(AskError::EmptyQuestion) => Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMPTY_QUESTION",
            AskError::EmptyQuestion.to_string(),
        )),
        Err(e @ AskError::Retrieval(_)) => {
            Err(api_error(StatusCode::SERVICE_UNAVAILABLE, "RETRIEVAL_ERROR", e.to_string()))
        }
        Err(e @ AskError::Model(_)) => {
            Err(api_error(StatusCode::BAD_GATEWAY, "MODEL_ERROR", e.to_string()))
        }
    }
}

async fn workspace_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<WorkspaceInventory>, ApiError> {
    let writer = state.coordinator.writer().clone();
    tokio::task::spawn_blocking(move || writer.inventory())
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "INVENTORY_ERROR", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::index::FixedIndex;
    use crate::adapters::models::ScriptedModelClient;
    use crate::services::{AgentExecutor, RetrievalContextBuilder, WorkspaceWriter};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    async fn spawn_server(root: &std::path::Path) -> String {
        let model = Arc::new(ScriptedModelClient::demo());
        let retrieval = RetrievalContextBuilder::new(Arc::new(FixedIndex::demo()), 6000);
        let coordinator = MultiAgentCoordinator::new(
            retrieval.clone(),
            AgentExecutor::new(model.clone()),
            WorkspaceWriter::new(root),
        );
        let answerer = QuestionAnswerer::new(retrieval, model.clone());
        let router =
            HttpServer::new(HttpServerConfig::default(), coordinator, answerer, model).build_router();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_generate_code_preview() {
        let dir = TempDir::new().unwrap();
        let base = spawn_server(dir.path()).await;

        let body: Value = reqwest::Client::new()
            .post(format!("{base}/generate_code"))
            .json(&json!({"instruction": "add a health check endpoint"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["applied"], false);
        assert_eq!(body["files"], json!([]));
        assert!(!body["candidate_files"].as_array().unwrap().is_empty());
        assert!(!dir.path().join("app").exists());
    }

    #[tokio::test]
    async fn test_empty_instruction_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let base = spawn_server(dir.path()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/generate_code"))
            .json(&json!({"instruction": "  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "EMPTY_INSTRUCTION");

        let response = reqwest::Client::new()
            .post(format!("{base}/ask"))
            .json(&json!({"question": ""}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_service_info_and_workspace() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let base = spawn_server(dir.path()).await;

        let info: Value = reqwest::get(format!("{base}/")).await.unwrap().json().await.unwrap();
        assert_eq!(info["name"], "triad");
        assert_eq!(info["agents"].as_array().unwrap().len(), 3);

        let inventory: Value = reqwest::get(format!("{base}/workspace/info"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(inventory["exists"], true);
        assert_eq!(inventory["total_files"], 1);
        assert_eq!(inventory["total_size"], 5);
    }

    #[tokio::test]
    async fn test_health_reports_model() {
        let dir = TempDir::new().unwrap();
        let base = spawn_server(dir.path()).await;

        let health: Value = reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(health["index"], "fixed");
        assert_eq!(health["model"], "scripted");
        assert_eq!(health["status"], "healthy");
    }
}
