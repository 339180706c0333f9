//! Expression catalog listing.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use avanim_models::Expression;

use crate::error::ApiResult;
use crate::services::list_expressions;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ExpressionListResponse {
    pub success: bool,
    pub expressions: Vec<Expression>,
}

/// GET /api/expressions
pub async fn get_expressions(State(state): State<AppState>) -> ApiResult<Json<ExpressionListResponse>> {
    let expressions = list_expressions(&state.store).await?;
    Ok(Json(ExpressionListResponse {
        success: true,
        expressions,
    }))
}
