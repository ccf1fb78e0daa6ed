//! Route table and handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

use edge_chat::HealthReport;
use edge_core::{AgentRequest, ChatReply, ChatRequest, StructuredAgentResponse};

use crate::error::ApiResult;
use crate::service::AgentService;

type AppState = State<Arc<AgentService>>;

/// Build the router over a shared service.
pub fn router(service: Arc<AgentService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        info_span!(
            "request",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            path = %request.uri().path(),
        )
    });

    Router::new()
        .route("/agent/ask", post(ask))
        .route("/agent/build_view", post(build_view))
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .route("/health/llm", get(health))
        .route("/debug/llm-config", get(debug_config))
        .layer(trace)
        .layer(cors)
        .with_state(service)
}

async fn ask(
    State(service): AppState,
    Json(request): Json<AgentRequest>,
) -> ApiResult<Json<StructuredAgentResponse>> {
    service.ask(request).await.map(Json)
}

async fn build_view(
    State(service): AppState,
    Json(request): Json<AgentRequest>,
) -> ApiResult<Json<StructuredAgentResponse>> {
    service.build_view(request).await.map(Json)
}

async fn chat(
    State(service): AppState,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    service.chat(request).await.map(Json)
}

async fn chat_stream(State(service): AppState, Json(request): Json<ChatRequest>) -> Response {
    let fragments = service.chat_stream(request).map(Ok::<_, Infallible>);
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(fragments),
    )
        .into_response()
}

async fn health(State(service): AppState) -> Json<HealthReport> {
    Json(service.health().await)
}

async fn debug_config(State(service): AppState) -> ApiResult<Json<Value>> {
    service.config_snapshot().map(Json)
}
