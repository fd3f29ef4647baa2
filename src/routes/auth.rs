use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::db;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::permission::ResolvedPermissions;
use crate::models::user::{AuthResponse, LoginRequest, User};
use crate::response::{ApiResponse, ValidatedJson};
use crate::utils::verify_password;

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or inactive user")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let db_user = db::users::fetch_db_user_by_email(&state.pool, payload.email.trim())
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    if !user.is_active() {
        return Err(AppError::unauthorized("user is inactive"));
    }

    let token = state.jwt.encode(user.id)?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(ApiResponse::ok(AuthResponse { token, user }, "Login realizado com sucesso"))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub permissions: ResolvedPermissions,
}

/// Current user and their effective permissions, as consumed by the frontend permission context.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = MeResponse)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<ApiResponse<MeResponse>> {
    let permissions = state.resolver.resolve_for(&auth.user).await?;

    Ok(ApiResponse::ok(
        MeResponse {
            user: auth.user,
            permissions: (*permissions).clone(),
        },
        "Usuário autenticado",
    ))
}
