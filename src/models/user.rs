use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AccessLevel {
    I,
    II,
    III,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 3] = [AccessLevel::I, AccessLevel::II, AccessLevel::III];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::I => "I",
            AccessLevel::II => "II",
            AccessLevel::III => "III",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AccessLevel::I => "Nível I - Básico",
            AccessLevel::II => "Nível II - Intermediário",
            AccessLevel::III => "Nível III - Avançado",
        }
    }
}

impl FromStr for AccessLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "I" => Ok(AccessLevel::I),
            "II" => Ok(AccessLevel::II),
            "III" => Ok(AccessLevel::III),
            other => Err(AppError::validation(format!("unknown access level '{other}'"))),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Administrador,
    Coordenador,
    Administrativo,
    Gerente,
    Supervisor,
}

impl AccessType {
    pub const ALL: [AccessType; 5] = [
        AccessType::Administrador,
        AccessType::Coordenador,
        AccessType::Administrativo,
        AccessType::Gerente,
        AccessType::Supervisor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Administrador => "administrador",
            AccessType::Coordenador => "coordenador",
            AccessType::Administrativo => "administrativo",
            AccessType::Gerente => "gerente",
            AccessType::Supervisor => "supervisor",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AccessType::Administrador => "Administrador",
            AccessType::Coordenador => "Coordenador",
            AccessType::Administrativo => "Administrativo",
            AccessType::Gerente => "Gerente",
            AccessType::Supervisor => "Supervisor",
        }
    }

    /// Administrators bypass per-screen checks entirely.
    pub fn is_admin(&self) -> bool {
        matches!(self, AccessType::Administrador)
    }
}

impl FromStr for AccessType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AccessType::ALL
            .into_iter()
            .find(|t| t.as_str() == value)
            .ok_or_else(|| AppError::validation(format!("unknown access type '{value}'")))
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Ativo,
    Inativo,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Ativo => "ativo",
            UserStatus::Inativo => "inativo",
        }
    }
}

impl FromStr for UserStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ativo" => Ok(UserStatus::Ativo),
            "inativo" => Ok(UserStatus::Inativo),
            other => Err(AppError::validation(format!("unknown user status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub access_level: AccessLevel,
    pub access_type: AccessType,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.access_type.is_admin()
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Ativo
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub access_level: String,
    pub access_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        let id = value.id;
        let corrupt = |err: AppError| AppError::internal(format!("user {id}: {err}"));

        Ok(User {
            id: value.id,
            access_level: value.access_level.parse().map_err(corrupt)?,
            access_type: value.access_type.parse().map_err(corrupt)?,
            status: value.status.parse().map_err(corrupt)?,
            name: value.name,
            email: value.email,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

pub const USER_COLUMNS: &str =
    "id, name, email, password_hash, access_level, access_type, status, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "maria@foods.com.br")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Row of the permission-management user listing.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub access_level: String,
    pub access_type: String,
    pub status: String,
    /// Screens on which the user holds at least one permission
    pub permissions_count: i64,
}
