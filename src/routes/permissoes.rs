//! Permission management API
//!
//! Screen registry dump, per-user effective permissions, explicit updates,
//! template resets and whole-table synchronization. Every write is published
//! to the audit log.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::app::AppState;
use crate::authz::templates::template_for;
use crate::authz::{PermissionChange, PermissoesEdit, PermissoesView, RequireScreen, Screen};
use crate::db;
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, RequestContext};
use crate::models::permission::*;
use crate::models::user::{AccessLevel, AccessType, UserSummary};
use crate::response::{ApiResponse, ValidatedJson};
use crate::utils::page_window;

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/usuarios", get(list_users))
        .route("/usuarios/:id", get(get_user_permissions).put(update_user_permissions))
        .route("/usuarios/:id/padrao", post(apply_user_template))
        .route("/telas", get(list_screens))
        .route("/padrao/:tipo/:nivel", get(get_template))
        .route("/tipos-acesso", get(list_access_types))
        .route("/niveis-acesso", get(list_access_levels))
        .route("/sincronizar", post(sync_permissions))
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Substring matched against name and email
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<UserSummary>,
    pub pagination: Pagination,
}

/// List users eligible for permission management
#[utoipa::path(
    get,
    path = "/permissoes/usuarios",
    tag = "Permissoes",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users with permission counts", body = UserListResponse),
        (status = 403, description = "Missing view permission on 'permissoes'"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    _guard: RequireScreen<PermissoesView>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<ApiResponse<UserListResponse>> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let (page, limit, offset) = page_window(query.page, query.limit);

    let items = db::users::list_summaries(&state.pool, search, limit, offset).await?;
    let total = db::users::count_users(&state.pool, search).await?;
    let pages = (total + limit - 1) / limit;

    Ok(ApiResponse::ok(
        UserListResponse {
            items,
            pagination: Pagination { total, page, limit, pages },
        },
        "Usuários listados com sucesso",
    ))
}

/// Effective permission map of one user
#[utoipa::path(
    get,
    path = "/permissoes/usuarios/{id}",
    tag = "Permissoes",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Resolved permissions", body = UserPermissionsResponse),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user_permissions(
    State(state): State<AppState>,
    _guard: RequireScreen<PermissoesView>,
    Path(user_id): Path<i64>,
) -> AppResult<ApiResponse<UserPermissionsResponse>> {
    let body = user_permissions(&state, user_id).await?;
    Ok(ApiResponse::ok(body, "Permissões do usuário encontradas com sucesso"))
}

/// Overwrite one screen's permissions, or a whole grid, for a user
#[utoipa::path(
    put,
    path = "/permissoes/usuarios/{id}",
    tag = "Permissoes",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdatePermissionsRequest,
    responses(
        (status = 200, description = "Permissions updated", body = UserPermissionsResponse),
        (status = 404, description = "User not found"),
        (status = 422, description = "Unknown screen or malformed payload"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user_permissions(
    State(state): State<AppState>,
    guard: RequireScreen<PermissoesEdit>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdatePermissionsRequest>,
) -> AppResult<ApiResponse<UserPermissionsResponse>> {
    let changes: Vec<PermissionChange> = match &req {
        UpdatePermissionsRequest::Single(update) => vec![
            state
                .synchronizer
                .update_permissions(user_id, &update.screen_key, update.flags())
                .await?,
        ],
        UpdatePermissionsRequest::Grid { permissoes } => {
            state.synchronizer.update_many(user_id, permissoes).await?
        }
    };

    let context = RequestContext::from_headers(&headers);
    for change in changes.iter().filter(|c| c.old.as_ref().map(|o| o.flags()) != Some(c.new.flags())) {
        log_activity_with_context(
            &state.event_bus,
            "updated",
            Some(guard.user.id),
            &change.new,
            change.old.as_ref(),
            Some(context.clone()),
        );
    }

    let body = user_permissions(&state, user_id).await?;
    Ok(ApiResponse::ok(body, "Permissões atualizadas com sucesso"))
}

/// Replace a user's permissions with the template of their access type and level
#[utoipa::path(
    post,
    path = "/permissoes/usuarios/{id}/padrao",
    tag = "Permissoes",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Template applied", body = UserPermissionsResponse),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn apply_user_template(
    State(state): State<AppState>,
    guard: RequireScreen<PermissoesEdit>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> AppResult<ApiResponse<UserPermissionsResponse>> {
    let applied = state.synchronizer.apply_template(user_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "reset",
        Some(guard.user.id),
        &applied,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    let body = user_permissions(&state, user_id).await?;
    Ok(ApiResponse::ok(body, "Permissões padrão aplicadas com sucesso"))
}

async fn user_permissions(state: &AppState, user_id: i64) -> AppResult<UserPermissionsResponse> {
    let user = db::users::fetch_user(&state.pool, user_id).await?;
    let resolved = state.resolver.resolve_for(&user).await?;

    Ok(UserPermissionsResponse {
        user,
        permissions: resolved.permissions.clone(),
    })
}

// =============================================================================
// REFERENCE DATA
// =============================================================================

/// Screen registry dump
#[utoipa::path(
    get,
    path = "/permissoes/telas",
    tag = "Permissoes",
    responses((status = 200, description = "Registered screens", body = Vec<Screen>)),
    security(("bearerAuth" = []))
)]
pub async fn list_screens(
    State(state): State<AppState>,
    _guard: RequireScreen<PermissoesView>,
) -> AppResult<ApiResponse<Vec<Screen>>> {
    Ok(ApiResponse::ok(
        state.registry.list_screens().to_vec(),
        "Telas listadas com sucesso",
    ))
}

/// Template grid for an access type and level
#[utoipa::path(
    get,
    path = "/permissoes/padrao/{tipo}/{nivel}",
    tag = "Permissoes",
    params(
        ("tipo" = String, Path, description = "Access type, e.g. coordenador"),
        ("nivel" = String, Path, description = "Access level: I, II or III"),
    ),
    responses(
        (status = 200, description = "Template grid", body = TemplateResponse),
        (status = 422, description = "Unknown access type or level"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_template(
    State(state): State<AppState>,
    _guard: RequireScreen<PermissoesView>,
    Path((tipo, nivel)): Path<(String, String)>,
) -> AppResult<ApiResponse<TemplateResponse>> {
    let access_type: AccessType = tipo.parse()?;
    let access_level: AccessLevel = nivel.parse()?;

    let permissions = template_for(&state.registry, access_type, access_level)
        .into_iter()
        .map(|(screen_key, flags)| TemplateEntry {
            screen_key,
            can_view: flags.can_view,
            can_create: flags.can_create,
            can_edit: flags.can_edit,
            can_delete: flags.can_delete,
        })
        .collect();

    Ok(ApiResponse::ok(
        TemplateResponse { access_type, access_level, permissions },
        "Permissões padrão encontradas com sucesso",
    ))
}

#[utoipa::path(
    get,
    path = "/permissoes/tipos-acesso",
    tag = "Permissoes",
    responses((status = 200, description = "Access types", body = Vec<OptionEntry>)),
    security(("bearerAuth" = []))
)]
pub async fn list_access_types(
    _guard: RequireScreen<PermissoesView>,
) -> AppResult<ApiResponse<Vec<OptionEntry>>> {
    let types = AccessType::ALL
        .iter()
        .map(|t| OptionEntry { value: t.as_str().to_string(), description: t.description().to_string() })
        .collect();
    Ok(ApiResponse::ok(types, "Tipos de acesso listados com sucesso"))
}

#[utoipa::path(
    get,
    path = "/permissoes/niveis-acesso",
    tag = "Permissoes",
    responses((status = 200, description = "Access levels", body = Vec<OptionEntry>)),
    security(("bearerAuth" = []))
)]
pub async fn list_access_levels(
    _guard: RequireScreen<PermissoesView>,
) -> AppResult<ApiResponse<Vec<OptionEntry>>> {
    let levels = AccessLevel::ALL
        .iter()
        .map(|l| OptionEntry { value: l.as_str().to_string(), description: l.description().to_string() })
        .collect();
    Ok(ApiResponse::ok(levels, "Níveis de acesso listados com sucesso"))
}

// =============================================================================
// SYNCHRONIZATION
// =============================================================================

/// Insert default rows for every (user, screen) pair that lacks one
#[utoipa::path(
    post,
    path = "/permissoes/sincronizar",
    tag = "Permissoes",
    responses((status = 200, description = "Rows inserted", body = SyncResponse)),
    security(("bearerAuth" = []))
)]
pub async fn sync_permissions(
    State(state): State<AppState>,
    guard: RequireScreen<PermissoesEdit>,
    headers: HeaderMap,
) -> AppResult<ApiResponse<SyncResponse>> {
    let inserted = state.synchronizer.sync_all().await?;

    log_activity_with_context(
        &state.event_bus,
        "synced",
        Some(guard.user.id),
        &SyncRun { inserted, screens: state.registry.len() },
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(ApiResponse::ok(SyncResponse { inserted }, "Permissões sincronizadas com sucesso"))
}
