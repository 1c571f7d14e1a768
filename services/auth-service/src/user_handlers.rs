use axum::{extract::State, http::StatusCode, Json};
use common_auth::{AuthContext, Role};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::directory::User;
use crate::error::ServiceResult;
use crate::service::{CurrentUser, NewUser, SignupRequest, UpdateUser};
use crate::tokens::TokenPair;
use crate::AppState;

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

pub async fn signup_user(
    State(state): State<AppState>,
    Json(body): Json<SignupBody>,
) -> ServiceResult<Json<User>> {
    let user = state
        .core
        .signup(SignupRequest {
            name: body.name,
            email: body.email,
            password: body.password,
            password_confirm: body.password_confirm,
        })
        .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login_user(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ServiceResult<Json<TokenPair>> {
    let pair = state.core.login(&body.email, &body.password).await?;
    Ok(Json(pair))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ServiceResult<Json<TokenPair>> {
    let pair = state.core.refresh(&body.refresh_token).await?;
    Ok(Json(pair))
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub async fn logout_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<RefreshRequest>,
) -> ServiceResult<Json<SuccessResponse>> {
    state.core.logout(&body.refresh_token).await?;
    info!(user_id = %auth.claims.subject_id, "user logged out");
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn current_user(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Json<CurrentUser> {
    Json(state.core.current_user(&auth.claims))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    /// Defaults to the caller.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<UpdateUserRequest>,
) -> ServiceResult<Json<User>> {
    let update = UpdateUser {
        id: body.id.unwrap_or(auth.claims.subject_id),
        name: body.name,
        email: body.email,
        password: body.password,
        role: body.role,
    };
    let user = state.core.update_user(&auth.claims, update).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct SaveUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

pub async fn save_user(
    State(state): State<AppState>,
    Json(body): Json<SaveUserRequest>,
) -> ServiceResult<(StatusCode, Json<User>)> {
    let user = state
        .core
        .save_user(NewUser {
            name: body.name,
            email: body.email,
            password: body.password,
            role: body.role.unwrap_or(Role::User),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub id: Uuid,
}

pub async fn delete_user(
    State(state): State<AppState>,
    Json(body): Json<DeleteUserRequest>,
) -> ServiceResult<Json<SuccessResponse>> {
    state.core.delete_user(body.id).await?;
    Ok(Json(SuccessResponse { success: true }))
}
