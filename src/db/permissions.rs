use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use crate::authz::{PermissionFlags, Screen};
use crate::errors::AppResult;
use crate::models::permission::{UserPermission, PERMISSION_COLUMNS};

pub async fn rows_for_user<'e, E>(executor: E, user_id: i64) -> AppResult<Vec<UserPermission>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {PERMISSION_COLUMNS} FROM usuario_permissoes WHERE user_id = ? ORDER BY screen_key"
    );
    let rows = sqlx::query_as::<_, UserPermission>(&sql)
        .bind(user_id)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

pub async fn fetch_row<'e, E>(
    executor: E,
    user_id: i64,
    screen_key: &str,
) -> AppResult<Option<UserPermission>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {PERMISSION_COLUMNS} FROM usuario_permissoes WHERE user_id = ? AND screen_key = ?"
    );
    let row = sqlx::query_as::<_, UserPermission>(&sql)
        .bind(user_id)
        .bind(screen_key)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Insert-or-overwrite of a single (user, screen) row. One statement, so
/// readers never see a half-written row.
pub async fn upsert<'e, E>(
    executor: E,
    user_id: i64,
    screen_key: &str,
    flags: PermissionFlags,
    now: DateTime<Utc>,
) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO usuario_permissoes (user_id, screen_key, can_view, can_create, can_edit, can_delete, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, screen_key) DO UPDATE SET
            can_view = excluded.can_view,
            can_create = excluded.can_create,
            can_edit = excluded.can_edit,
            can_delete = excluded.can_delete,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(screen_key)
    .bind(flags.can_view)
    .bind(flags.can_create)
    .bind(flags.can_edit)
    .bind(flags.can_delete)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

/// Adds the screen's default row for every user (or one user) lacking it.
/// Existing rows are left untouched. Returns the number of rows inserted.
pub async fn insert_missing_defaults<'e, E>(
    executor: E,
    screen: &Screen,
    user_id: Option<i64>,
    now: DateTime<Utc>,
) -> AppResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let flags = screen.default_permissions;
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO usuario_permissoes (user_id, screen_key, can_view, can_create, can_edit, can_delete, updated_at)
        SELECT u.id, ?, ?, ?, ?, ?, ?
        FROM usuarios u
        WHERE (? IS NULL OR u.id = ?)
        "#,
    )
    .bind(&screen.key)
    .bind(flags.can_view)
    .bind(flags.can_create)
    .bind(flags.can_edit)
    .bind(flags.can_delete)
    .bind(now)
    .bind(user_id)
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_for_user<'e, E>(executor: E, user_id: i64) -> AppResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM usuario_permissoes WHERE user_id = ?")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
