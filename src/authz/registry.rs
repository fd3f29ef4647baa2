use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PermissionFlags;
use crate::errors::AppError;

/// A protected area of the application and its default permission template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Screen {
    #[schema(example = "fornecedores")]
    pub key: String,
    #[schema(example = "Fornecedores")]
    pub label: String,
    pub default_permissions: PermissionFlags,
}

impl Screen {
    pub fn new(key: &str, label: &str, default_permissions: PermissionFlags) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            default_permissions,
        }
    }
}

/// Ordered, immutable set of screens. Built once at startup.
#[derive(Debug, Clone)]
pub struct ScreenRegistry {
    screens: Vec<Screen>,
}

impl ScreenRegistry {
    pub fn new(screens: Vec<Screen>) -> Result<Self, AppError> {
        if screens.is_empty() {
            return Err(AppError::configuration("screen registry is empty"));
        }

        let mut seen = HashSet::new();
        for screen in &screens {
            let valid_key = !screen.key.is_empty()
                && screen
                    .key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if !valid_key {
                return Err(AppError::configuration(format!(
                    "invalid screen key '{}'",
                    screen.key
                )));
            }
            if !seen.insert(screen.key.as_str()) {
                return Err(AppError::configuration(format!(
                    "duplicate screen key '{}'",
                    screen.key
                )));
            }
        }

        Ok(Self { screens })
    }

    pub fn builtin() -> Self {
        use PermissionFlags as F;

        let screens = vec![
            Screen::new("usuarios", "Usuários", F::NONE),
            Screen::new("fornecedores", "Fornecedores", F::VIEW_ONLY),
            Screen::new("clientes", "Clientes", F::VIEW_ONLY),
            Screen::new("filiais", "Filiais", F::VIEW_ONLY),
            Screen::new("rotas", "Rotas", F::VIEW_ONLY),
            Screen::new("produtos", "Produtos", F::VIEW_ONLY),
            Screen::new("grupos", "Grupos", F::VIEW_ONLY),
            Screen::new("subgrupos", "Subgrupos", F::VIEW_ONLY),
            Screen::new("classes", "Classes", F::VIEW_ONLY),
            Screen::new("nome_generico_produto", "Nome Genérico", F::VIEW_ONLY),
            Screen::new("unidades", "Unidades", F::VIEW_ONLY),
            Screen::new("unidades_escolares", "Unidades Escolares", F::VIEW_ONLY),
            Screen::new("marcas", "Marcas", F::VIEW_ONLY),
            Screen::new("veiculos", "Veículos", F::VIEW_ONLY),
            Screen::new("motoristas", "Motoristas", F::VIEW_ONLY),
            Screen::new("ajudantes", "Ajudantes", F::VIEW_ONLY),
            Screen::new("cotacao", "Cotação", F::VIEW_ONLY),
            Screen::new("permissoes", "Permissões", F::NONE),
        ];

        Self { screens }
    }

    /// Reads the registry from the JSON file named by `SCREEN_REGISTRY_PATH`,
    /// falling back to the built-in screens when the variable is unset.
    pub fn from_env() -> Result<Self, AppError> {
        match std::env::var("SCREEN_REGISTRY_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim())),
            _ => Ok(Self::builtin()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        let screens: Vec<Screen> = serde_json::from_str(&raw).map_err(|err| {
            AppError::configuration(format!("invalid screen registry {}: {err}", path.display()))
        })?;

        let registry = Self::new(screens)?;
        tracing::info!(path = %path.display(), screens = registry.len(), "loaded screen registry");
        Ok(registry)
    }

    pub fn list_screens(&self) -> &[Screen] {
        &self.screens
    }

    pub fn get(&self, key: &str) -> Option<&Screen> {
        self.screens.iter().find(|s| s.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }
}

impl Default for ScreenRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
