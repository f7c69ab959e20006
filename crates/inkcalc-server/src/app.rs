use std::any::Any;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use inkcalc_contracts::PromptVariant;
use inkcalc_engine::Calculator;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::calculate;
use crate::calculate::responses::ErrorEnvelope;
use crate::error::FAILURE_MESSAGE;

#[derive(Clone)]
pub struct AppState {
    pub calculator: Arc<dyn Calculator>,
    /// Used when a request does not say `step_by_step`.
    pub default_variant: PromptVariant,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else {
        "request handler panicked".to_string()
    };
    tracing::error!(panic = %detail, "request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorEnvelope::new(FAILURE_MESSAGE, detail)),
    )
        .into_response()
}

pub fn build_router(state: AppState, allowed_origin: HeaderValue, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .merge(calculate::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
