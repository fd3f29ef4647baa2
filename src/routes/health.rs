use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::response::ApiResponse;
use sqlx::query_scalar;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    pub screens: usize,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> AppResult<ApiResponse<HealthResponse>> {
    // Lightweight DB check
    let db_check = query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await;

    let db_ok = match db_check {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the database");
            false
        }
    };

    Ok(ApiResponse::ok(
        HealthResponse { status: "ok", db_ok, screens: state.registry.len() },
        "ok",
    ))
}
