use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

use super::{
    Document, Filter, StorageAdapter, StorageError, StorageResult, doc_id, now_timestamp,
    prepare_insert, prepare_patch, validate_collection,
};

/// Documents live in one JSONB table keyed by `(collection, id)`; `seq` keeps
/// insertion order. The schema is in `migrations/`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_err(collection: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StorageError::corrupt(collection, err)
        }
        other => StorageError::Unavailable(other.to_string()),
    }
}

fn into_document(collection: &str, value: Value) -> StorageResult<Document> {
    match value {
        Value::Object(doc) => Ok(doc),
        other => Err(StorageError::corrupt(
            collection,
            format!("expected an object, found {other}"),
        )),
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, collection: &str, filter: &Filter) {
    builder.push(" WHERE collection = ");
    builder.push_bind(collection.to_string());
    for (field, value) in filter.fields() {
        builder.push(" AND COALESCE(body -> ");
        builder.push_bind(field.clone());
        builder.push(", 'null'::jsonb) = ");
        builder.push_bind(Json(value.clone()));
    }
}

#[async_trait]
impl StorageAdapter for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StorageResult<Vec<Document>> {
        validate_collection(collection)?;
        let mut builder = QueryBuilder::<Postgres>::new("SELECT body FROM documents");
        push_filter(&mut builder, collection, filter);
        builder.push(" ORDER BY seq");

        let rows: Vec<(Json<Value>,)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|err| map_err(collection, err))?;

        rows.into_iter()
            .map(|(Json(body),)| into_document(collection, body))
            .collect()
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StorageResult<u64> {
        validate_collection(collection)?;
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents");
        push_filter(&mut builder, collection, filter);

        let (total,): (i64,) = builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_err(collection, err))?;
        Ok(total.max(0) as u64)
    }

    async fn insert(&self, collection: &str, doc: Document) -> StorageResult<Document> {
        validate_collection(collection)?;
        let doc = prepare_insert(doc);
        let id = doc_id(&doc).unwrap_or_default().to_string();

        let result = sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(doc),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StorageError::DuplicateId {
                    collection: collection.to_string(),
                    id,
                })
            }
            Err(err) => Err(map_err(collection, err)),
        }
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> StorageResult<Option<Document>> {
        validate_collection(collection)?;
        let patch = prepare_patch(patch);

        // `||` on jsonb is a shallow merge, matching the other backends.
        let row: Option<(Json<Value>,)> = sqlx::query_as(
            r#"
            UPDATE documents
            SET body = body || $3
            WHERE collection = $1 AND id = $2
            RETURNING body
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&patch))
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| map_err(collection, err))?;

        row.map(|(Json(body),)| into_document(collection, body))
            .transpose()
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        validate_collection(collection)?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| map_err(collection, err))?;
        Ok(result.rows_affected() > 0)
    }

    async fn decrement_if_at_least(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        amount: i64,
    ) -> StorageResult<bool> {
        validate_collection(collection)?;
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = jsonb_set(
                    body,
                    ARRAY[$3::text],
                    to_jsonb((COALESCE((body ->> $3)::numeric, 0) - $4)::bigint)
                ) || jsonb_build_object('updatedAt', $5::text)
            WHERE collection = $1
              AND id = $2
              AND COALESCE((body ->> $3)::numeric, 0) - $4
                  BETWEEN 0 AND 9223372036854775807
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(field)
        .bind(amount)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|err| map_err(collection, err))?;
        Ok(result.rows_affected() == 1)
    }
}
