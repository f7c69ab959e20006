use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use inkcalc_engine::error_chain_text;
use thiserror::Error;

use crate::calculate::responses::ErrorEnvelope;

pub const FAILURE_MESSAGE: &str = "Error processing image";
pub const INVALID_BODY_MESSAGE: &str = "Invalid request body";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{detail}")]
    InvalidBody { status: StatusCode, detail: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, envelope) = match self {
            ApiError::InvalidBody { status, detail } => {
                tracing::debug!(%status, %detail, "rejected request body");
                (status, ErrorEnvelope::new(INVALID_BODY_MESSAGE, detail))
            }
            ApiError::Internal(err) => {
                let detail = error_chain_text(&err, 2048);
                tracing::error!(error = %detail, "calculation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorEnvelope::new(FAILURE_MESSAGE, detail),
                )
            }
        };
        (status, Json(envelope)).into_response()
    }
}
