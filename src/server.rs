//! HTTP surface: `POST /api/chat`, `POST /api/log`, `GET /health`.
//!
//! [`serve`] wires the database pool, providers, and chat pipeline into an
//! axum router. [`router`] is public so tests can drive it without a socket.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::chat::{ChatPipeline, ChatRequest};
use crate::config::DocentConfig;
use crate::db::{self, DbPool};
use crate::error::ChatError;
use crate::interactions::{log_interaction, NewInteraction};
use crate::retrieval::SqliteRetriever;
use crate::{completion, embedding, memory};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub pool: Arc<DbPool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/log", post(log))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the pool and build providers and pipeline from config.
pub fn build_state(config: &DocentConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let pool = Arc::new(DbPool::open(
        &db_path,
        config.storage.pool_size,
        config.embedding.dimensions,
    )?);

    {
        let conn = db::open_database(&db_path, config.embedding.dimensions)?;
        db::check_embedding_meta(&conn, &config.embedding.model, config.embedding.dimensions)?;
    }

    let embedder: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding));
    let completion: Arc<dyn completion::CompletionProvider> =
        Arc::from(completion::create_provider(&config.completion));
    let retriever = Arc::new(SqliteRetriever::new(Arc::clone(&pool), &config.retrieval));
    let memory = memory::create_recorder(&config.memory);

    if config.completion.api_key.is_empty() {
        tracing::warn!("no completion API key configured, set OPENAI_API_KEY");
    }
    tracing::info!(
        embedding_model = %config.embedding.model,
        completion_model = %config.completion.model,
        memory = memory.is_some(),
        "providers ready"
    );

    let pipeline = ChatPipeline::new(embedder, retriever, completion, memory)
        .context("failed to build greeting classifier")?;

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        pool,
    })
}

/// Run the HTTP server until ctrl-c.
pub async fn serve(config: DocentConfig) -> Result<()> {
    let state = build_state(&config)?;
    let bind_addr = config.bind_addr();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "docent listening at http://{bind_addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let started = Instant::now();

    // Malformed bodies get the same 500 as upstream failures.
    let Json(request) = payload.map_err(|e| {
        tracing::warn!(error = %e, "rejected malformed chat request");
        ApiError::internal("Invalid request")
    })?;

    match state.pipeline.respond(request).await {
        Ok(stream) => Ok((
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(stream.detach()),
        )
            .into_response()),
        Err(ChatError::InvalidRequest(reason)) => {
            tracing::warn!(reason = %reason, "rejected invalid chat request");
            Err(ApiError::internal("Invalid request"))
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "chat request failed"
            );
            Err(ApiError::internal("Internal Server Error"))
        }
    }
}

#[derive(Serialize)]
struct LogResponse {
    success: bool,
}

async fn log(
    State(state): State<AppState>,
    payload: Result<Json<NewInteraction>, JsonRejection>,
) -> Result<Json<LogResponse>, ApiError> {
    let Json(entry) = payload.map_err(|e| {
        tracing::warn!(error = %e, "rejected malformed log request");
        ApiError::internal("Invalid request")
    })?;

    let user_id = entry.user_id.clone();
    state
        .pool
        .run(move |conn| log_interaction(conn, &entry))
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "failed to log interaction");
            ApiError::internal("Failed to log interaction")
        })?;

    Ok(Json(LogResponse { success: true }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Error body returned to clients: `{"error": "..."}`. Never carries upstream detail.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}
