// src/api/routes.rs

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{AnalyzeRequest, AnalyzeResponse, HealthResponse};
use crate::config::CONFIG;
use crate::services::AnalyzeInput;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = match CONFIG.cors_origin.as_str() {
        "*" => CorsLayer::permissive(),
        origin => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(tower_http::cors::Any),
            Err(_) => {
                warn!(origin, "invalid TB_CORS_ORIGIN, falling back to permissive");
                CorsLayer::permissive()
            }
        },
    };

    Router::new()
        .route("/analyze-and-suggest", post(analyze_and_suggest_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            CONFIG.request_timeout_secs,
        )))
        .layer(cors)
        .with_state(state)
}

async fn analyze_and_suggest_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    if request.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("userId is required"));
    }

    let input = AnalyzeInput {
        text: request.text,
        user_id: request.user_id,
        session_id: request.session_id,
        attachment_hint: request.attachment_style_hint,
        context_hint: request.context_hint,
        tier: request.tier,
        preferred_categories: request.preferred_categories,
    };

    let outcome = state.analyze_service.analyze(input).await?;
    Ok(Json(AnalyzeResponse::from(outcome)))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        parser_circuit_open: state.gateway.circuit_open(),
    })
}
