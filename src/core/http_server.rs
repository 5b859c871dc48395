use crate::configuration::Context;
use crate::extraction::{AiFillRequest, AiFillResponse, ExtractionError, ExtractionService};
use crate::llm::LLMError;
use crate::title::{TitleRequest, TitleResponse, TitleService};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

pub struct AppState {
    pub extraction: ExtractionService,
    pub titles: TitleService,
}

impl AppState {
    pub fn new(context: &Context) -> Self {
        Self {
            extraction: ExtractionService::new(context),
            titles: TitleService::new(context),
        }
    }
}

pub struct HttpServer;

impl HttpServer {
    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/ai-fill", post(ai_fill))
            .route("/ai-title", post(ai_title))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    pub async fn start(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
        let state = Arc::new(AppState::new(context));
        let app = Self::router(state);

        let address = format!("{}:{}", context.config.host, context.config.port);
        let listener = TcpListener::bind(&address).await?;
        info!("HTTP server running on {address}");

        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

async fn ai_fill(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AiFillRequest>,
) -> Result<Json<AiFillResponse>, ExtractionError> {
    let request_id = Uuid::new_v4();
    info!(%request_id, "ai-fill request received");
    let response = state.extraction.fill(&request).await?;
    info!(%request_id, "ai-fill request complete");
    Ok(Json(response))
}

async fn ai_title(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TitleRequest>,
) -> Json<TitleResponse> {
    Json(state.titles.generate(&request).await)
}

impl IntoResponse for ExtractionError {
    fn into_response(self) -> Response {
        let status = match &self {
            ExtractionError::InvalidInput => StatusCode::BAD_REQUEST,
            ExtractionError::Llm(LLMError::NoProviderConfigured) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ExtractionError::Llm(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            error!("ai-fill failed: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
