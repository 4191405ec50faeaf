use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{fs, sync::Mutex};

use super::{
    Document, Filter, StorageAdapter, StorageError, StorageResult, apply_decrement, doc_id,
    prepare_insert, prepare_patch, validate_collection,
};

/// Stores each collection as a pretty-printed JSON array in `<dir>/<collection>.json`.
///
/// Reads go to disk every time so edits made outside the process are picked up.
/// Writes are serialized through one mutex and land via write-to-temp + rename,
/// so a crash mid-write leaves the previous file intact.
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|err| unavailable(&dir, err))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, collection: &str) -> StorageResult<PathBuf> {
        validate_collection(collection)?;
        Ok(self.dir.join(format!("{collection}.json")))
    }

    async fn read(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let path = self.path_for(collection)?;
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(unavailable(&path, err)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: Value =
            serde_json::from_str(&raw).map_err(|err| StorageError::corrupt(collection, err))?;
        let Value::Array(items) = value else {
            return Err(StorageError::corrupt(collection, "top-level value is not an array"));
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::Object(doc) => Ok(doc),
                other => Err(StorageError::corrupt(
                    collection,
                    format!("expected an object, found {other}"),
                )),
            })
            .collect()
    }

    async fn write(&self, collection: &str, docs: Vec<Document>) -> StorageResult<()> {
        let path = self.path_for(collection)?;
        let tmp = path.with_extension("json.tmp");
        let items: Vec<Value> = docs.into_iter().map(Value::Object).collect();
        let body = serde_json::to_vec_pretty(&items)
            .map_err(|err| StorageError::corrupt(collection, err))?;
        fs::write(&tmp, body)
            .await
            .map_err(|err| unavailable(&tmp, err))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|err| unavailable(&path, err))?;
        Ok(())
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Unavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl StorageAdapter for JsonFileStore {
    fn backend(&self) -> &'static str {
        "json-file"
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StorageResult<Vec<Document>> {
        let docs = self.read(collection).await?;
        if filter.is_empty() {
            return Ok(docs);
        }
        Ok(docs.into_iter().filter(|d| filter.matches(d)).collect())
    }

    async fn insert(&self, collection: &str, doc: Document) -> StorageResult<Document> {
        let doc = prepare_insert(doc);
        let _guard = self.write_lock.lock().await;
        let mut docs = self.read(collection).await?;
        let id = doc_id(&doc).unwrap_or_default();
        if docs.iter().any(|existing| doc_id(existing) == Some(id)) {
            return Err(StorageError::DuplicateId {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        docs.push(doc.clone());
        self.write(collection, docs).await?;
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> StorageResult<Option<Document>> {
        let patch = prepare_patch(patch);
        let _guard = self.write_lock.lock().await;
        let mut docs = self.read(collection).await?;
        let Some(doc) = docs.iter_mut().find(|d| doc_id(d) == Some(id)) else {
            return Ok(None);
        };
        for (key, value) in patch {
            doc.insert(key, value);
        }
        let updated = doc.clone();
        self.write(collection, docs).await?;
        Ok(Some(updated))
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.read(collection).await?;
        let before = docs.len();
        docs.retain(|d| doc_id(d) != Some(id));
        if docs.len() == before {
            return Ok(false);
        }
        self.write(collection, docs).await?;
        Ok(true)
    }

    async fn decrement_if_at_least(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        amount: i64,
    ) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.read(collection).await?;
        let Some(doc) = docs.iter_mut().find(|d| doc_id(d) == Some(id)) else {
            return Ok(false);
        };
        if !apply_decrement(collection, doc, field, amount)? {
            return Ok(false);
        }
        self.write(collection, docs).await?;
        Ok(true)
    }
}
