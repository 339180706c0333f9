//! Admin-only user management.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use avanim_models::{User, UserId};

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::handlers::MessageResponse;
use crate::services::AdminAction;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UserListResponse {
    pub success: bool,
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub struct UserActionRequest {
    #[serde(default)]
    pub action: String,
}

#[derive(Serialize)]
pub struct UserActionResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<UserListResponse>> {
    let users = state.user_service.list_users().await?;
    Ok(Json(UserListResponse {
        success: true,
        users,
    }))
}

/// PUT /api/admin/user/:user_id
pub async fn update_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
    Json(request): Json<UserActionRequest>,
) -> ApiResult<Json<UserActionResponse>> {
    let action = AdminAction::parse(&request.action)?;
    let user = state
        .user_service
        .moderate(&admin.0, &UserId::from_string(user_id), action)
        .await?;

    Ok(Json(UserActionResponse {
        success: true,
        message: "User updated successfully".to_string(),
        user,
    }))
}

/// DELETE /api/admin/user/:user_id
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .user_service
        .delete_user(&admin.0, &UserId::from_string(user_id))
        .await?;
    Ok(Json(MessageResponse::ok("User deleted successfully")))
}
