use serde_json::{Map, Value, json};

use crate::storage::{StorageAdapter, StorageResult};

pub const AUDIT_COLLECTION: &str = "audit_logs";

pub async fn log_audit(
    store: &dyn StorageAdapter,
    user_id: Option<&str>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> StorageResult<()> {
    let mut entry = Map::new();
    entry.insert("user".into(), json!(user_id));
    entry.insert("action".into(), json!(action));
    entry.insert("resource".into(), json!(resource));
    entry.insert("metadata".into(), metadata.unwrap_or(Value::Null));
    store.insert(AUDIT_COLLECTION, entry).await?;

    Ok(())
}

/// Audit writes never fail the request that triggered them.
pub async fn record(
    store: &dyn StorageAdapter,
    user_id: Option<&str>,
    action: &str,
    resource: &str,
    metadata: Value,
) {
    if let Err(err) = log_audit(store, user_id, action, Some(resource), Some(metadata)).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
