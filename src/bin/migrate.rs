use std::time::Duration;

use storefront_api::{
    config::{AppConfig, StorageBackend},
    db::{create_pool, run_migrations},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let StorageBackend::Postgres { database_url } = &config.storage else {
        println!("STORAGE_BACKEND is not postgres; nothing to migrate");
        return Ok(());
    };

    let pool = create_pool(
        database_url,
        config.db_max_connections,
        Duration::from_secs(config.db_acquire_timeout_secs),
    )
    .await?;
    run_migrations(&pool).await?;
    println!("Migrations applied");
    Ok(())
}
