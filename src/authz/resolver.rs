use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::cache::PermissionCache;
use super::registry::ScreenRegistry;
use super::{Action, CapabilityCheck, PermissionFlags};
use crate::db;
use crate::errors::AppResult;
use crate::models::permission::{
    EffectivePermission, PermissionSource, ResolvedPermissions, UserPermission,
};
use crate::models::user::User;

/// Merges the registry defaults with a user's stored rows.
///
/// Resolution order per screen:
/// 1. access type `administrador` -> every flag granted
/// 2. stored row for (user, screen) -> stored values, even when stricter than the default
/// 3. screen default
///
/// Rows for screens that are not in the registry are ignored.
pub fn merge_permissions(
    registry: &ScreenRegistry,
    user: &User,
    rows: &[UserPermission],
) -> ResolvedPermissions {
    let stored: HashMap<&str, &UserPermission> =
        rows.iter().map(|row| (row.screen_key.as_str(), row)).collect();

    let permissions: BTreeMap<String, EffectivePermission> = registry
        .list_screens()
        .iter()
        .map(|screen| {
            let effective = if user.is_admin() {
                EffectivePermission::new(&screen.key, PermissionFlags::ALL, PermissionSource::Administrador)
            } else if let Some(row) = stored.get(screen.key.as_str()) {
                EffectivePermission::new(&screen.key, row.flags(), PermissionSource::Explicit)
            } else {
                EffectivePermission::new(&screen.key, screen.default_permissions, PermissionSource::Default)
            };
            (screen.key.clone(), effective)
        })
        .collect();

    ResolvedPermissions {
        user_id: user.id,
        access_type: user.access_type,
        permissions,
    }
}

#[derive(Debug, Clone)]
pub struct PermissionResolver {
    pool: SqlitePool,
    registry: Arc<ScreenRegistry>,
    cache: PermissionCache,
}

impl PermissionResolver {
    pub fn new(pool: SqlitePool, registry: Arc<ScreenRegistry>, cache: PermissionCache) -> Self {
        Self { pool, registry, cache }
    }

    /// Effective permissions of `user_id` on every registered screen.
    pub async fn resolve_for_user(&self, user_id: i64) -> AppResult<Arc<ResolvedPermissions>> {
        let user = db::users::fetch_user(&self.pool, user_id).await?;
        self.resolve_for(&user).await
    }

    /// Cached resolve for a freshly loaded user.
    ///
    /// `usuarios` is edited outside this service, so a cached entry whose
    /// access type no longer matches `user` is discarded.
    pub async fn resolve_for(&self, user: &User) -> AppResult<Arc<ResolvedPermissions>> {
        if let Some(hit) = self.cache.get(user.id) {
            if hit.access_type == user.access_type {
                return Ok(hit);
            }
            tracing::debug!(
                user_id = user.id,
                cached = %hit.access_type,
                current = %user.access_type,
                "access type changed, dropping cached permissions"
            );
            self.cache.invalidate(user.id);
        }

        let epoch = self.cache.epoch();
        let resolved = Arc::new(self.resolve_loaded(user).await?);
        self.cache.insert_if_current(epoch, Arc::clone(&resolved));

        Ok(resolved)
    }

    /// Resolves `user` straight from the database, bypassing the cache.
    pub async fn resolve_loaded(&self, user: &User) -> AppResult<ResolvedPermissions> {
        let rows = if user.is_admin() {
            Vec::new()
        } else {
            db::permissions::rows_for_user(&self.pool, user.id).await?
        };

        let resolved = merge_permissions(&self.registry, user, &rows);
        tracing::debug!(
            user_id = user.id,
            access_type = %user.access_type,
            explicit_rows = rows.len(),
            "permissions resolved"
        );
        Ok(resolved)
    }
}

#[async_trait]
impl CapabilityCheck for PermissionResolver {
    async fn can_perform(&self, user_id: i64, screen_key: &str, action: Action) -> AppResult<bool> {
        // access_type was just checked against the stored user
        let resolved = self.resolve_for_user(user_id).await?;
        let allowed = resolved.access_type.is_admin() || resolved.can(screen_key, action);

        tracing::debug!(
            user_id,
            screen = %screen_key,
            action = %action,
            allowed,
            "capability check"
        );
        Ok(allowed)
    }
}
