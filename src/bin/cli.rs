use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use permissoes::authz::{PermissionCache, PermissionSynchronizer, ScreenRegistry};
use permissoes::db::users::{insert_user, NewUser};
use permissoes::models::user::{AccessLevel, AccessType};
use permissoes::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "permissoes operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Insert default permission rows for every user/screen pair missing one
    Sync,
    /// Create a user and seed their default permissions
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// administrador, coordenador, administrativo, gerente or supervisor
        #[arg(long = "type")]
        access_type: String,
        /// I, II or III
        #[arg(long = "level", default_value = "I")]
        access_level: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Fall back to the crate-local `.env` when the CWD has none.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::Sync => {
            let pool = get_pool().await?;
            let synchronizer = synchronizer(pool)?;
            let inserted = synchronizer.sync_all().await?;
            println!("Inserted {} permission rows", inserted);
        }
        Commands::CreateUser { name, email, password, access_type, access_level } => {
            let access_type: AccessType = access_type.parse()?;
            let access_level: AccessLevel = access_level.parse()?;
            let password_hash = hash_password(&password)?;

            let pool = get_pool().await?;
            let user_id = insert_user(
                &pool,
                NewUser {
                    name: name.trim(),
                    email: email.trim(),
                    password_hash: &password_hash,
                    access_level,
                    access_type,
                },
            )
            .await?;

            let inserted = synchronizer(pool)?.sync_user(user_id).await?;
            println!("Created user {} ({} default permission rows)", user_id, inserted);
        }
    }

    Ok(())
}

fn synchronizer(pool: SqlitePool) -> anyhow::Result<PermissionSynchronizer> {
    let registry = ScreenRegistry::from_env()?;
    Ok(PermissionSynchronizer::new(pool, Arc::new(registry), PermissionCache::new()))
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // No migrations table means nothing is applied yet
    let table: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied_versions: HashSet<i64> = if table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, otherwise the crate-local folder
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
