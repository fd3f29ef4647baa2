#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

use permissoes::create_app;
use permissoes::db::users::{insert_user, NewUser};
use permissoes::jwt::JwtConfig;
use permissoes::models::user::{AccessLevel, AccessType};
use permissoes::utils::hash_password;

pub const PASSWORD: &str = "password123";

/// A migrated throwaway database and the router on top of it.
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // Keeps the database file alive for the duration of the test
    _dir: TempDir,
}

pub async fn setup() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        access_type: AccessType,
        access_level: AccessLevel,
    ) -> Result<i64> {
        let password_hash = hash_password(PASSWORD)?;
        let id = insert_user(
            &self.pool,
            NewUser { name, email, password_hash: &password_hash, access_level, access_type },
        )
        .await?;
        Ok(id)
    }

    pub fn token_for(&self, user_id: i64) -> Result<String> {
        Ok(JwtConfig::from_env()?.encode(user_id)?)
    }

    /// Sends a request and returns the status and the decoded JSON body.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok((status, json))
    }

    pub async fn permission_rows(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usuario_permissoes WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
