//! Animation generation, listing and deletion.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use avanim_models::{Animation, AnimationId, AvatarId};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::avatars::read_form;
use crate::handlers::MessageResponse;
use crate::services::{AnimationView, Generated};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub avatar_id: String,
    #[serde(default)]
    pub expression_id: String,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub message: String,
    pub animation: Animation,
}

impl From<Generated> for GenerateResponse {
    fn from(generated: Generated) -> Self {
        Self {
            success: generated.outcome.is_success(),
            message: generated.outcome.message().to_string(),
            animation: generated.animation,
        }
    }
}

#[derive(Serialize)]
pub struct AnimationListResponse {
    pub success: bool,
    pub animations: Vec<AnimationView>,
}

/// POST /api/animation/generate
///
/// Generation runs inline; the returned record is already completed or failed.
pub async fn generate_animation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    if request.avatar_id.trim().is_empty() || request.expression_id.trim().is_empty() {
        return Err(ApiError::bad_request("Avatar and expression are required"));
    }

    let generated = state
        .animation_service
        .generate_expression(
            &user.0,
            &AvatarId::from_string(request.avatar_id.trim()),
            request.expression_id.trim(),
        )
        .await?;
    Ok(Json(generated.into()))
}

/// POST /api/animation/custom
pub async fn generate_custom_animation(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<GenerateResponse>> {
    let (file, fields) = read_form(multipart, "driving").await?;
    let avatar_id = fields
        .get("avatar_id")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Avatar is required"))?;
    let file = file
        .filter(|f| !f.filename.is_empty())
        .ok_or_else(|| ApiError::bad_request("Driving video is required"))?;

    let generated = state
        .animation_service
        .generate_custom(
            &user.0,
            &AvatarId::from_string(avatar_id),
            &file.filename,
            &file.data,
        )
        .await?;
    Ok(Json(generated.into()))
}

/// GET /api/animations
pub async fn list_animations(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AnimationListResponse>> {
    let animations = state.animation_service.list(&user.0).await?;
    Ok(Json(AnimationListResponse {
        success: true,
        animations,
    }))
}

/// DELETE /api/animation/:animation_id
pub async fn delete_animation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(animation_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .animation_service
        .delete(&user.0, &AnimationId::from_string(animation_id))
        .await?;
    Ok(Json(MessageResponse::ok("Animation deleted successfully")))
}
