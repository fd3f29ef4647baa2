use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{
    AuthzMode, CapabilityCheck, PermissionCache, PermissionResolver, PermissionSynchronizer,
    ScreenRegistry,
};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{auth, health, permissoes};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub registry: Arc<ScreenRegistry>,
    pub resolver: PermissionResolver,
    pub synchronizer: PermissionSynchronizer,
    pub capabilities: Arc<dyn CapabilityCheck>,
    pub event_bus: EventBus,
    pub authz_mode: AuthzMode,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        jwt: JwtConfig,
        registry: ScreenRegistry,
        event_bus: EventBus,
        authz_mode: AuthzMode,
    ) -> Self {
        let registry = Arc::new(registry);
        let cache = PermissionCache::new();
        let resolver = PermissionResolver::new(pool.clone(), Arc::clone(&registry), cache.clone());
        let synchronizer = PermissionSynchronizer::new(pool.clone(), Arc::clone(&registry), cache);

        Self {
            capabilities: Arc::new(resolver.clone()),
            pool,
            jwt: Arc::new(jwt),
            registry,
            resolver,
            synchronizer,
            event_bus,
            authz_mode,
        }
    }
}

/// Builds the router from environment configuration and starts the audit listener.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let registry = ScreenRegistry::from_env()?;
    let authz_mode = AuthzMode::from_env();

    let (event_bus, event_rx) = init_event_bus();
    tokio::spawn(start_activity_listener(event_rx, pool.clone()));

    tracing::info!(screens = registry.len(), ?authz_mode, "permission service configured");

    let state = AppState::new(pool, jwt_config, registry, event_bus, authz_mode);
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/permissoes", permissoes::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
