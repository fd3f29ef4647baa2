use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;

use super::cache::PermissionCache;
use super::registry::ScreenRegistry;
use super::templates;
use super::PermissionFlags;
use crate::db;
use crate::errors::{AppError, AppResult};
use crate::models::permission::{PermissionUpdate, TemplateApplied, UserPermission};
use crate::utils::utc_now;

/// A write to one (user, screen) row: the previous row, if any, and the new one.
#[derive(Debug, Clone)]
pub struct PermissionChange {
    pub old: Option<UserPermission>,
    pub new: UserPermission,
}

/// Keeps `usuario_permissoes` complete and applies explicit updates.
///
/// Concurrent callers rely on the `(user_id, screen_key)` primary key: inserts
/// are `INSERT OR IGNORE` and updates are single-statement upserts, so no
/// application-level locking is needed.
#[derive(Debug, Clone)]
pub struct PermissionSynchronizer {
    pool: SqlitePool,
    registry: Arc<ScreenRegistry>,
    cache: PermissionCache,
}

impl PermissionSynchronizer {
    pub fn new(pool: SqlitePool, registry: Arc<ScreenRegistry>, cache: PermissionCache) -> Self {
        Self { pool, registry, cache }
    }

    /// Inserts the screen default for every (user, screen) pair without a row.
    /// Runs in one transaction; a second run inserts nothing.
    pub async fn sync_all(&self) -> AppResult<u64> {
        let now = utc_now();
        let mut tx = self.pool.begin().await?;

        let mut inserted = 0;
        for screen in self.registry.list_screens() {
            let added = db::permissions::insert_missing_defaults(&mut *tx, screen, None, now).await?;
            if added > 0 {
                tracing::debug!(screen = %screen.key, added, "screen rows backfilled");
            }
            inserted += added;
        }

        tx.commit().await?;
        self.cache.invalidate_all();

        tracing::info!(inserted, screens = self.registry.len(), "permission sync finished");
        Ok(inserted)
    }

    /// [`sync_all`](Self::sync_all) restricted to one user.
    pub async fn sync_user(&self, user_id: i64) -> AppResult<u64> {
        db::users::fetch_user(&self.pool, user_id).await?;

        let now = utc_now();
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for screen in self.registry.list_screens() {
            inserted +=
                db::permissions::insert_missing_defaults(&mut *tx, screen, Some(user_id), now).await?;
        }
        tx.commit().await?;
        self.cache.invalidate(user_id);

        tracing::info!(user_id, inserted, "user permission sync finished");
        Ok(inserted)
    }

    /// Upserts one row, overwriting any existing override.
    pub async fn update_permissions(
        &self,
        user_id: i64,
        screen_key: &str,
        flags: PermissionFlags,
    ) -> AppResult<PermissionChange> {
        self.ensure_screen(screen_key)?;

        // The previous row is read in the same transaction as the write so the
        // audit entry records what was actually replaced.
        let now = utc_now();
        let mut tx = self.pool.begin().await?;
        db::users::fetch_user(&mut *tx, user_id).await?;
        let old = db::permissions::fetch_row(&mut *tx, user_id, screen_key).await?;
        db::permissions::upsert(&mut *tx, user_id, screen_key, flags, now).await?;
        tx.commit().await?;
        self.cache.invalidate(user_id);

        tracing::info!(user_id, screen = %screen_key, ?flags, "permissions updated");
        Ok(PermissionChange {
            old,
            new: stored_row(user_id, screen_key, flags, now),
        })
    }

    /// Upserts a batch of rows atomically. Every screen key is validated
    /// before anything is written.
    pub async fn update_many(
        &self,
        user_id: i64,
        updates: &[PermissionUpdate],
    ) -> AppResult<Vec<PermissionChange>> {
        for update in updates {
            self.ensure_screen(&update.screen_key)?;
        }

        let now = utc_now();
        let mut tx = self.pool.begin().await?;
        db::users::fetch_user(&mut *tx, user_id).await?;
        let mut previous: HashMap<String, UserPermission> =
            db::permissions::rows_for_user(&mut *tx, user_id)
                .await?
                .into_iter()
                .map(|row| (row.screen_key.clone(), row))
                .collect();
        for update in updates {
            db::permissions::upsert(&mut *tx, user_id, &update.screen_key, update.flags(), now).await?;
        }
        tx.commit().await?;
        self.cache.invalidate(user_id);

        tracing::info!(user_id, rows = updates.len(), "permission grid updated");
        Ok(updates
            .iter()
            .map(|update| PermissionChange {
                old: previous.remove(&update.screen_key),
                new: stored_row(user_id, &update.screen_key, update.flags(), now),
            })
            .collect())
    }

    /// Replaces all of the user's rows with the grid for their access type and level.
    pub async fn apply_template(&self, user_id: i64) -> AppResult<TemplateApplied> {
        let user = db::users::fetch_user(&self.pool, user_id).await?;
        let grid = templates::template_for(&self.registry, user.access_type, user.access_level);

        let now = utc_now();
        let mut tx = self.pool.begin().await?;
        db::permissions::delete_for_user(&mut *tx, user_id).await?;
        for (screen_key, flags) in &grid {
            db::permissions::upsert(&mut *tx, user_id, screen_key, *flags, now).await?;
        }
        tx.commit().await?;
        self.cache.invalidate(user_id);

        tracing::info!(
            user_id,
            access_type = %user.access_type,
            access_level = %user.access_level,
            "permission template applied"
        );
        Ok(TemplateApplied {
            user_id,
            access_type: user.access_type,
            access_level: user.access_level,
            rows: grid.len(),
        })
    }

    fn ensure_screen(&self, screen_key: &str) -> AppResult<()> {
        if self.registry.contains(screen_key) {
            Ok(())
        } else {
            Err(AppError::validation(format!("unknown screen '{screen_key}'")))
        }
    }
}

fn stored_row(
    user_id: i64,
    screen_key: &str,
    flags: PermissionFlags,
    now: chrono::DateTime<chrono::Utc>,
) -> UserPermission {
    UserPermission {
        user_id,
        screen_key: screen_key.to_string(),
        can_view: flags.can_view,
        can_create: flags.can_create,
        can_edit: flags.can_edit,
        can_delete: flags.can_delete,
        updated_at: now,
    }
}
