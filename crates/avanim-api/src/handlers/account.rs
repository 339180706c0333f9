//! Signup, login, profile and subscription handlers.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use validator::Validate;

use avanim_models::User;

use crate::auth::{session_cookie, session_cookie_removal, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::handlers::MessageResponse;
use crate::security::sanitize_name;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub fullname: String,
    #[serde(default)]
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub fullname: String,
    #[serde(default)]
    #[validate(email)]
    pub email: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub role: String,
    pub token: String,
    /// Dashboard the client should open
    pub redirect: String,
    pub user: User,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: User,
}

fn required(fields: &[&str]) -> ApiResult<()> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ApiError::bad_request("All fields are required"));
    }
    Ok(())
}

/// POST /api/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<Json<UserResponse>> {
    required(&[
        request.fullname.as_str(),
        request.email.as_str(),
        request.password.as_str(),
    ])?;
    request.validate()?;

    let fullname = sanitize_name(&request.fullname);
    let user = state
        .user_service
        .signup(&fullname, &request.email, &request.password)
        .await?;

    Ok(Json(UserResponse {
        success: true,
        message: "Registration successful".to_string(),
        user,
    }))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = state
        .user_service
        .authenticate(&request.email, &request.password)
        .await?;
    let token = state.sessions.issue(&user)?;
    let jar = jar.add(session_cookie(token.clone(), state.config.is_production()));

    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            message: "Login successful".to_string(),
            role: user.role.to_string(),
            token,
            redirect: user.role.dashboard_path().to_string(),
            user,
        }),
    ))
}

/// POST /api/logout
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.remove(session_cookie_removal()),
        Json(MessageResponse::ok("Logged out")),
    )
}

/// GET /api/profile
pub async fn get_profile(user: AuthUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        success: true,
        user: user.0,
    })
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    required(&[request.fullname.as_str(), request.email.as_str()])?;
    request.validate()?;

    let fullname = sanitize_name(&request.fullname);
    let updated = state
        .user_service
        .update_profile(user.id(), &fullname, &request.email)
        .await?;

    Ok(Json(UserResponse {
        success: true,
        message: "Profile updated successfully".to_string(),
        user: updated,
    }))
}

/// POST /api/subscription/update
pub async fn update_subscription(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<UserResponse>> {
    let updated = state.user_service.subscribe(&user.0).await?;
    Ok(Json(UserResponse {
        success: true,
        message: "Subscription updated successfully".to_string(),
        user: updated,
    }))
}
