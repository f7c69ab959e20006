use axum::extract::State;
use axum::Json;
use inkcalc_contracts::PromptVariant;
use inkcalc_engine::CalculationRequest;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ApiJson;

use super::requests::CalculateRequest;
use super::responses::CalculateResponse;

pub async fn post_calculate(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CalculateRequest>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let variant = body
        .step_by_step
        .map(PromptVariant::from_step_flag)
        .unwrap_or(state.default_variant);

    let records = state
        .calculator
        .calculate(CalculationRequest {
            image: body.image,
            bindings: body.dict_of_vars.unwrap_or_default(),
            variant,
        })
        .await?;

    Ok(Json(CalculateResponse::success(records)))
}
