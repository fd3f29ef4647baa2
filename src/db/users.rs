use sqlx::{Executor, Sqlite};

use crate::errors::{AppError, AppResult};
use crate::models::user::{AccessLevel, AccessType, DbUser, User, UserStatus, UserSummary, USER_COLUMNS};
use crate::utils::utc_now;

pub async fn fetch_db_user<'e, E>(executor: E, user_id: i64) -> AppResult<Option<DbUser>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM usuarios WHERE id = ?");
    let row = sqlx::query_as::<_, DbUser>(&sql)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn fetch_user<'e, E>(executor: E, user_id: i64) -> AppResult<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    fetch_db_user(executor, user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {user_id} not found")))?
        .try_into()
}

pub async fn fetch_db_user_by_email<'e, E>(executor: E, email: &str) -> AppResult<Option<DbUser>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM usuarios WHERE email = ?");
    let row = sqlx::query_as::<_, DbUser>(&sql)
        .bind(email)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub access_level: AccessLevel,
    pub access_type: AccessType,
}

pub async fn insert_user<'e, E>(executor: E, user: NewUser<'_>) -> AppResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = utc_now();
    let result = sqlx::query(
        "INSERT INTO usuarios (name, email, password_hash, access_level, access_type, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.name)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.access_level.as_str())
    .bind(user.access_type.as_str())
    .bind(UserStatus::Ativo.as_str())
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

const SUMMARY_SELECT: &str = r#"
    SELECT
        u.id, u.name, u.email, u.access_level, u.access_type, u.status,
        COALESCE(p.permissions_count, 0) AS permissions_count
    FROM usuarios u
    LEFT JOIN (
        SELECT user_id, COUNT(*) AS permissions_count
        FROM usuario_permissoes
        WHERE can_view = 1 OR can_create = 1 OR can_edit = 1 OR can_delete = 1
        GROUP BY user_id
    ) p ON u.id = p.user_id
"#;

/// Page of users ordered by name, optionally filtered by a name/email substring.
pub async fn list_summaries<'e, E>(
    executor: E,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<UserSummary>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = match search {
        Some(term) => {
            let pattern = format!("%{term}%");
            let sql = format!(
                "{SUMMARY_SELECT} WHERE u.name LIKE ? OR u.email LIKE ? ORDER BY u.name ASC, u.id ASC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, UserSummary>(&sql)
                .bind(pattern.clone())
                .bind(pattern)
                .bind(limit)
                .bind(offset)
                .fetch_all(executor)
                .await?
        }
        None => {
            let sql = format!("{SUMMARY_SELECT} ORDER BY u.name ASC, u.id ASC LIMIT ? OFFSET ?");
            sqlx::query_as::<_, UserSummary>(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(executor)
                .await?
        }
    };
    Ok(rows)
}

pub async fn count_users<'e, E>(executor: E, search: Option<&str>) -> AppResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let total = match search {
        Some(term) => {
            let pattern = format!("%{term}%");
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM usuarios WHERE name LIKE ? OR email LIKE ?",
            )
            .bind(pattern.clone())
            .bind(pattern)
            .fetch_one(executor)
            .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM usuarios")
                .fetch_one(executor)
                .await?
        }
    };
    Ok(total)
}
