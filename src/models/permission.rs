use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::authz::{Action, PermissionFlags};
use crate::events::{Loggable, Severity};
use crate::models::user::{AccessLevel, AccessType, User};

/// Stored per-user override for one screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserPermission {
    pub user_id: i64,
    pub screen_key: String,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub updated_at: DateTime<Utc>,
}

impl UserPermission {
    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags {
            can_view: self.can_view,
            can_create: self.can_create,
            can_edit: self.can_edit,
            can_delete: self.can_delete,
        }
    }
}

impl Loggable for UserPermission {
    fn entity_type() -> &'static str { "usuario_permissao" }
    fn subject_id(&self) -> Option<i64> { Some(self.user_id) }
    fn severity(&self) -> Severity { Severity::Critical }
}

pub const PERMISSION_COLUMNS: &str =
    "user_id, screen_key, can_view, can_create, can_edit, can_delete, updated_at";

/// Where an effective permission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionSource {
    /// Access type `administrador`; every flag granted.
    Administrador,
    /// A stored row for the (user, screen) pair.
    Explicit,
    /// No stored row; the screen's default template.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EffectivePermission {
    pub screen_key: String,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub source: PermissionSource,
}

impl EffectivePermission {
    pub fn new(screen_key: impl Into<String>, flags: PermissionFlags, source: PermissionSource) -> Self {
        Self {
            screen_key: screen_key.into(),
            can_view: flags.can_view,
            can_create: flags.can_create,
            can_edit: flags.can_edit,
            can_delete: flags.can_delete,
            source,
        }
    }

    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags {
            can_view: self.can_view,
            can_create: self.can_create,
            can_edit: self.can_edit,
            can_delete: self.can_delete,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.flags().allows(action)
    }
}

/// Effective permissions of one user across every registered screen.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvedPermissions {
    pub user_id: i64,
    pub access_type: AccessType,
    pub permissions: BTreeMap<String, EffectivePermission>,
}

impl ResolvedPermissions {
    pub fn get(&self, screen_key: &str) -> Option<&EffectivePermission> {
        self.permissions.get(screen_key)
    }

    /// Unknown screens are denied.
    pub fn can(&self, screen_key: &str, action: Action) -> bool {
        self.get(screen_key).map(|p| p.allows(action)).unwrap_or(false)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserPermissionsResponse {
    pub user: User,
    pub permissions: BTreeMap<String, EffectivePermission>,
}

/// One screen's requested flags. All four are required.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionUpdate {
    #[schema(example = "fornecedores")]
    pub screen_key: String,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl PermissionUpdate {
    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags {
            can_view: self.can_view,
            can_create: self.can_create,
            can_edit: self.can_edit,
            can_delete: self.can_delete,
        }
    }
}

/// `PUT /permissoes/usuarios/:id` accepts a single screen or the whole grid.
///
/// A body carrying a `permissoes` key is a grid. Decoding errors keep the
/// path of the offending field, e.g. `permissoes[1].can_edit`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum UpdatePermissionsRequest {
    Grid { permissoes: Vec<PermissionUpdate> },
    Single(PermissionUpdate),
}

#[derive(Deserialize)]
struct GridBody {
    permissoes: Vec<PermissionUpdate>,
}

impl<'de> Deserialize<'de> for UpdatePermissionsRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let parsed = if value.get("permissoes").is_some() {
            serde_path_to_error::deserialize(value).map(|GridBody { permissoes }| Self::Grid { permissoes })
        } else {
            serde_path_to_error::deserialize(value).map(Self::Single)
        };

        parsed.map_err(|err| {
            let path = err.path().to_string();
            if path == "." {
                D::Error::custom(err.into_inner())
            } else {
                D::Error::custom(format!("{}: {}", path, err.into_inner()))
            }
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    pub inserted: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateEntry {
    pub screen_key: String,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateResponse {
    pub access_type: AccessType,
    pub access_level: AccessLevel,
    pub permissions: Vec<TemplateEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OptionEntry {
    pub value: String,
    pub description: String,
}

/// Audit record for a whole-table synchronization run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRun {
    pub inserted: u64,
    pub screens: usize,
}

impl Loggable for SyncRun {
    fn entity_type() -> &'static str { "sincronizacao" }
    fn subject_id(&self) -> Option<i64> { None }
}

/// Audit record for a template reset on one user.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateApplied {
    pub user_id: i64,
    pub access_type: AccessType,
    pub access_level: AccessLevel,
    pub rows: usize,
}

impl Loggable for TemplateApplied {
    fn entity_type() -> &'static str { "usuario_permissao" }
    fn subject_id(&self) -> Option<i64> { Some(self.user_id) }
    fn severity(&self) -> Severity { Severity::Critical }
}
