//! Authorization module - screen registry, permission resolution and sync
//!
//! - Static screen registry with default permission templates
//! - Per-user overrides merged over the defaults (administrators bypass)
//! - Synchronizer that backfills default rows for every (user, screen) pair
//! - Typed route guards with configurable enforcement modes (off/advisory/strict)

mod cache;
mod guard;
mod registry;
mod resolver;
mod sync;
pub mod templates;

pub use cache::PermissionCache;
pub use guard::{PermissoesEdit, PermissoesView, RequireScreen, ScreenGuard};
pub use registry::{Screen, ScreenRegistry};
pub use resolver::{merge_permissions, PermissionResolver};
pub use sync::{PermissionChange, PermissionSynchronizer};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

/// Authorization enforcement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzMode {
    /// No permission checks (development mode)
    Off,
    /// Log denials but allow requests (testing mode)
    Advisory,
    /// Enforce 403 on denied requests (production mode)
    Strict,
}

impl AuthzMode {
    pub fn from_env() -> Self {
        match std::env::var("AUTHZ_MODE").unwrap_or_default().to_lowercase().as_str() {
            "off" => AuthzMode::Off,
            "advisory" => AuthzMode::Advisory,
            _ => AuthzMode::Strict,
        }
    }
}

/// The four capabilities every screen is gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[serde(alias = "visualizar")]
    View,
    #[serde(alias = "criar")]
    Create,
    #[serde(alias = "editar")]
    Edit,
    #[serde(alias = "excluir")]
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "view" | "visualizar" => Ok(Action::View),
            "create" | "criar" => Ok(Action::Create),
            "edit" | "editar" => Ok(Action::Edit),
            "delete" | "excluir" => Ok(Action::Delete),
            other => Err(AppError::validation(format!("unknown action '{other}'"))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionFlags {
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl PermissionFlags {
    pub const ALL: PermissionFlags = PermissionFlags::new(true, true, true, true);
    pub const NONE: PermissionFlags = PermissionFlags::new(false, false, false, false);
    pub const VIEW_ONLY: PermissionFlags = PermissionFlags::new(true, false, false, false);

    pub const fn new(can_view: bool, can_create: bool, can_edit: bool, can_delete: bool) -> Self {
        Self { can_view, can_create, can_edit, can_delete }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_view,
            Action::Create => self.can_create,
            Action::Edit => self.can_edit,
            Action::Delete => self.can_delete,
        }
    }

    pub fn any(&self) -> bool {
        self.can_view || self.can_create || self.can_edit || self.can_delete
    }
}

/// Capability check consumed by route guards and anything else that needs a yes/no answer.
#[async_trait]
pub trait CapabilityCheck: Send + Sync {
    /// Whether `user_id` may perform `action` on `screen_key`. Must not mutate state.
    async fn can_perform(&self, user_id: i64, screen_key: &str, action: Action) -> AppResult<bool>;
}

/// Well-known screen keys referenced from code
pub mod screens {
    pub const USUARIOS: &str = "usuarios";
    pub const COTACAO: &str = "cotacao";
    pub const PERMISSOES: &str = "permissoes";
}
