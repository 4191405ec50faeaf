use std::{sync::Arc, time::Duration};

use anyhow::Result;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    config::{AppConfig, StorageBackend},
    storage::{JsonFileStore, MemoryStore, PostgresStore, StorageAdapter},
};

pub type DbPool = PgPool;

/// Create a Postgres pool. Acquire waits are bounded so a dead database
/// surfaces as an error instead of a hung request.
pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Build the storage adapter selected by configuration.
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn StorageAdapter>> {
    let store: Arc<dyn StorageAdapter> = match &config.storage {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::JsonFile { data_dir } => Arc::new(JsonFileStore::open(data_dir).await?),
        StorageBackend::Postgres { database_url } => {
            let pool = create_pool(
                database_url,
                config.db_max_connections,
                Duration::from_secs(config.db_acquire_timeout_secs),
            )
            .await?;
            run_migrations(&pool).await?;
            Arc::new(PostgresStore::new(pool))
        }
    };
    tracing::info!(backend = store.backend(), "storage ready");
    Ok(store)
}
