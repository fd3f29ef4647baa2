use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, actor_id: Option<i64>, subject_id: Option<i64>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Request context for audit entries (IP, User-Agent)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Extract context from Axum request headers
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

/// Structured audit payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    /// The current/new state of the entity
    #[serde(rename = "new")]
    pub current: Value,
    /// The previous state (for updates)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
}

/// Publishes an audit event for any entity implementing `Loggable`.
///
/// # Arguments
/// * `event_bus` - The event bus to send the event to.
/// * `action` - The action performed (e.g., "updated", "synced", "reset").
/// * `actor_id` - The user who performed the action.
/// * `entity` - The current/new entity state.
/// * `old_entity` - Optional previous entity state.
/// * `context` - Optional request context (IP, User-Agent).
pub fn log_activity_with_context<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<i64>,
    entity: &T,
    old_entity: Option<&T>,
    context: Option<RequestContext>,
) {
    let event_name = format!("{}.{}", T::entity_type(), action);

    let severity = entity.severity_for_action(action);
    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
        context,
        severity,
    };

    let event = DomainEvent::new(
        event_name,
        actor_id,
        entity.subject_id(),
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    // Fire and forget - audit failures should not break the API
    if event_bus.send(serde_json::to_value(event).unwrap_or_default()).is_err() {
        tracing::debug!(action, "no audit listener attached");
    }
}

fn describe(name: &str) -> &'static str {
    match name {
        "usuario_permissao.updated" => "Permissão de usuário atualizada",
        "usuario_permissao.reset" => "Permissões restauradas para o padrão",
        "sincronizacao.synced" => "Permissões sincronizadas",
        _ => "Evento do sistema",
    }
}

/// SHA-256 over the previous hash followed by the payload.
pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Drains the event bus into `audit_log`, chaining each entry to the previous one.
pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("audit listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged, events dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if let Err(err) = persist_event(&pool, &event).await {
            tracing::error!(error = %err, "failed to save audit entry");
        }
    }
    tracing::info!("audit listener stopped");
}

async fn persist_event(pool: &SqlitePool, event: &Value) -> Result<(), sqlx::Error> {
    let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
    let actor_id = event.get("actor_id").and_then(Value::as_i64);
    let subject_id = event.get("subject_id").and_then(Value::as_i64);
    let severity = event
        .get("payload")
        .and_then(|p| p.get("severity"))
        .and_then(|s| s.as_str())
        .unwrap_or("important");
    let occurred_at = event
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let id = event
        .get("id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let payload = serde_json::to_string(event).unwrap_or_default();

    let last: Option<(String, i64)> =
        sqlx::query_as("SELECT hash, seq FROM audit_log ORDER BY seq DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    let (prev_hash, seq) = match last {
        Some((hash, seq)) => (Some(hash), seq + 1),
        None => (None, 1),
    };
    let hash = chain_hash(prev_hash.as_deref(), &payload);

    sqlx::query(
        r#"
        INSERT INTO audit_log (id, event_name, description, actor_id, subject_id, occurred_at, payload, severity, prev_hash, hash, seq)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(describe(name))
    .bind(actor_id)
    .bind(subject_id)
    .bind(occurred_at)
    .bind(&payload)
    .bind(severity)
    .bind(&prev_hash)
    .bind(&hash)
    .bind(seq)
    .execute(pool)
    .await?;

    Ok(())
}
