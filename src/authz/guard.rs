use std::marker::PhantomData;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::{screens, Action, AuthzMode};
use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::AuthUser;
use crate::models::user::User;

/// A (screen, action) pair named at the type level.
pub trait ScreenGuard: Send + Sync + 'static {
    const SCREEN: &'static str;
    const ACTION: Action;
}

/// Extractor that authenticates the caller and checks `G` before the handler runs.
#[derive(Debug, Clone)]
pub struct RequireScreen<G: ScreenGuard> {
    pub user: User,
    _guard: PhantomData<G>,
}

#[async_trait]
impl<G: ScreenGuard> FromRequestParts<AppState> for RequireScreen<G> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser { user } = AuthUser::from_request_parts(parts, state).await?;
        let granted = |user: User| RequireScreen { user, _guard: PhantomData };

        if state.authz_mode == AuthzMode::Off || user.is_admin() {
            return Ok(granted(user));
        }

        let allowed = state.capabilities.can_perform(user.id, G::SCREEN, G::ACTION).await?;
        if allowed {
            return Ok(granted(user));
        }

        match state.authz_mode {
            AuthzMode::Advisory => {
                tracing::warn!(
                    user_id = user.id,
                    screen = G::SCREEN,
                    action = %G::ACTION,
                    "permission denied (advisory mode, allowing)"
                );
                Ok(granted(user))
            }
            _ => {
                tracing::info!(
                    user_id = user.id,
                    screen = G::SCREEN,
                    action = %G::ACTION,
                    "permission denied"
                );
                Err(AppError::forbidden(format!(
                    "missing '{}' permission on screen '{}'",
                    G::ACTION,
                    G::SCREEN
                )))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PermissoesView;
impl ScreenGuard for PermissoesView {
    const SCREEN: &'static str = screens::PERMISSOES;
    const ACTION: Action = Action::View;
}

#[derive(Debug, Clone, Copy)]
pub struct PermissoesEdit;
impl ScreenGuard for PermissoesEdit {
    const SCREEN: &'static str = screens::PERMISSOES;
    const ACTION: Action = Action::Edit;
}
