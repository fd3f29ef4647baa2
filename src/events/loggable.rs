use serde::{Deserialize, Serialize};

/// Severity levels for audit entries.
/// Controls retention policies and log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Critical events: long-term retention, never auto-delete
    Critical,
    /// Important events: medium-term retention (default)
    #[default]
    Important,
}

/// Trait for entities that can be written to the audit log.
pub trait Loggable: Serialize + Send + Sync {
    /// The entity type name (e.g., "usuario_permissao", "sincronizacao")
    /// This becomes the prefix in event names like "usuario_permissao.updated"
    fn entity_type() -> &'static str;

    /// The user the entry is about, if any
    fn subject_id(&self) -> Option<i64>;

    /// Severity level for logs (defaults to Important)
    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Override severity based on action (a template reset is always Critical)
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "reset" => Severity::Critical,
            "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}
