use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    Document, Filter, StorageAdapter, StorageError, StorageResult, apply_decrement, doc_id,
    prepare_insert, prepare_patch,
};

/// Process-local store. Used for tests and throwaway demo instances.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StorageResult<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, doc: Document) -> StorageResult<Document> {
        let doc = prepare_insert(doc);
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let id = doc_id(&doc).unwrap_or_default();
        if docs.iter().any(|existing| doc_id(existing) == Some(id)) {
            return Err(StorageError::DuplicateId {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> StorageResult<Option<Document>> {
        let patch = prepare_patch(patch);
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| doc_id(d) == Some(id)))
        else {
            return Ok(None);
        };
        for (key, value) in patch {
            doc.insert(key, value);
        }
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| doc_id(d) != Some(id));
        Ok(docs.len() != before)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StorageResult<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn decrement_if_at_least(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        amount: i64,
    ) -> StorageResult<bool> {
        let mut collections = self.collections.write().await;
        match collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| doc_id(d) == Some(id)))
        {
            Some(doc) => apply_decrement(collection, doc, field, amount),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_identity_and_preserves_order() {
        let store = MemoryStore::new();
        let a = store.insert("products", doc(json!({ "name": "a" }))).await.unwrap();
        store.insert("products", doc(json!({ "name": "b" }))).await.unwrap();

        assert!(doc_id(&a).is_some());
        assert!(a.contains_key("createdAt"));
        let names: Vec<_> = store
            .find_all("products")
            .await
            .unwrap()
            .iter()
            .map(|d| d["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        store.insert("users", doc(json!({ "id": "u1" }))).await.unwrap();
        let err = store.insert("users", doc(json!({ "id": "u1" }))).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateId { .. }));
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_ids() {
        let store = MemoryStore::new();
        assert!(store.update("users", "nope", Document::new()).await.unwrap().is_none());
        assert!(!store.delete("users", "nope").await.unwrap());

        let user = store.insert("users", doc(json!({ "name": "x" }))).await.unwrap();
        let id = doc_id(&user).unwrap().to_string();
        let updated = store
            .update("users", &id, doc(json!({ "name": "y" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["name"], "y");
        assert!(store.delete("users", &id).await.unwrap());
        assert_eq!(store.count("users", &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_decrements_never_oversell() {
        let store = Arc::new(MemoryStore::new());
        let product = store
            .insert("products", doc(json!({ "stock": 5 })))
            .await
            .unwrap();
        let id = doc_id(&product).unwrap().to_string();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .decrement_if_at_least("products", &id, "stock", 1)
                    .await
                    .unwrap()
            }));
        }
        let mut won = 0;
        for handle in handles {
            if handle.await.unwrap() {
                won += 1;
            }
        }

        assert_eq!(won, 5);
        let product = store
            .find_one("products", &Filter::new().eq("id", id.as_str()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product["stock"], 0);
    }
}
