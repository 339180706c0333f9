//! Avatar upload, listing and deletion.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;

use avanim_models::{Avatar, AvatarId};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::MessageResponse;
use crate::metrics;
use crate::state::AppState;

/// A file part from a multipart form.
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Split a multipart form into the file named `file_field` and the text fields.
pub async fn read_form(
    mut multipart: Multipart,
    file_field: &str,
) -> ApiResult<(Option<UploadedFile>, HashMap<String, String>)> {
    let mut file = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?.to_vec();
            file = Some(UploadedFile { filename, data });
        } else if !name.is_empty() {
            fields.insert(name, field.text().await?);
        }
    }

    Ok((file, fields))
}

#[derive(Serialize)]
pub struct AvatarResponse {
    pub success: bool,
    pub message: String,
    pub avatar: Avatar,
}

#[derive(Serialize)]
pub struct AvatarListResponse {
    pub success: bool,
    pub avatars: Vec<Avatar>,
}

/// POST /api/avatar/upload
pub async fn upload_avatar(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<AvatarResponse>> {
    let (file, _) = read_form(multipart, "avatar").await?;
    let file = file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    if file.filename.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }

    let avatar = state
        .avatar_service
        .upload(&user.0, &file.filename, &file.data)
        .await?;
    metrics::record_upload("avatar", file.data.len());

    Ok(Json(AvatarResponse {
        success: true,
        message: "Avatar uploaded successfully".to_string(),
        avatar,
    }))
}

/// GET /api/avatars
pub async fn list_avatars(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AvatarListResponse>> {
    let avatars = state.avatar_service.list(&user.0).await?;
    Ok(Json(AvatarListResponse {
        success: true,
        avatars,
    }))
}

/// DELETE /api/avatar/:avatar_id
pub async fn delete_avatar(
    State(state): State<AppState>,
    user: AuthUser,
    Path(avatar_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .avatar_service
        .delete(&user.0, &AvatarId::from_string(avatar_id))
        .await?;
    Ok(Json(MessageResponse::ok("Avatar deleted successfully")))
}
