//! Access-level permission grids applied when an administrator resets a
//! user's permissions to the defaults of their access type and level.

use super::registry::ScreenRegistry;
use super::{screens, PermissionFlags};
use crate::models::user::{AccessLevel, AccessType};

pub fn template_flags(access_type: AccessType, level: AccessLevel, screen_key: &str) -> PermissionFlags {
    use PermissionFlags as F;

    match (screen_key, level) {
        (screens::COTACAO, _) => F::VIEW_ONLY,
        (screens::PERMISSOES, AccessLevel::I | AccessLevel::II) => F::NONE,
        (screens::USUARIOS | screens::PERMISSOES, AccessLevel::III)
            if access_type == AccessType::Coordenador =>
        {
            F::new(true, true, true, false)
        }
        (screens::USUARIOS, AccessLevel::II) => F::new(true, true, false, false),
        (_, AccessLevel::I) => F::VIEW_ONLY,
        (_, AccessLevel::II) => F::new(true, true, true, false),
        (_, AccessLevel::III) => F::ALL,
    }
}

/// The grid for every registered screen, in registry order.
pub fn template_for(
    registry: &ScreenRegistry,
    access_type: AccessType,
    level: AccessLevel,
) -> Vec<(String, PermissionFlags)> {
    registry
        .list_screens()
        .iter()
        .map(|screen| (screen.key.clone(), template_flags(access_type, level, &screen.key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_grow_monotonically() {
        let t = AccessType::Gerente;
        assert_eq!(template_flags(t, AccessLevel::I, "rotas"), PermissionFlags::VIEW_ONLY);
        assert_eq!(template_flags(t, AccessLevel::II, "rotas"), PermissionFlags::new(true, true, true, false));
        assert_eq!(template_flags(t, AccessLevel::III, "rotas"), PermissionFlags::ALL);
    }

    #[test]
    fn cotacao_is_view_only_everywhere() {
        for level in AccessLevel::ALL {
            for t in AccessType::ALL {
                assert_eq!(template_flags(t, level, "cotacao"), PermissionFlags::VIEW_ONLY);
            }
        }
    }

    #[test]
    fn permission_screen_needs_level_three() {
        assert_eq!(
            template_flags(AccessType::Administrativo, AccessLevel::II, "permissoes"),
            PermissionFlags::NONE
        );
        assert_eq!(
            template_flags(AccessType::Administrativo, AccessLevel::III, "permissoes"),
            PermissionFlags::ALL
        );
        assert!(!template_flags(AccessType::Coordenador, AccessLevel::III, "permissoes").can_delete);
    }

    #[test]
    fn template_covers_the_registry() {
        let registry = ScreenRegistry::builtin();
        let grid = template_for(&registry, AccessType::Supervisor, AccessLevel::I);
        assert_eq!(grid.len(), registry.len());
        assert_eq!(grid[0].0, "usuarios");
    }
}
