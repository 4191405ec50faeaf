use std::time::Duration;

use serde_json::{Map, Value, json};
use storefront_api::{
    db::{create_pool, run_migrations},
    storage::{Filter, PostgresStore, StorageAdapter},
};

fn doc(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// Runs against a real database; skipped when none is configured.
#[tokio::test]
async fn documents_round_trip_through_postgres() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run the Postgres storage test."
            );
            return Ok(());
        }
    };

    let pool = create_pool(&database_url, 2, Duration::from_secs(5)).await?;
    run_migrations(&pool).await?;
    sqlx::query("DELETE FROM documents WHERE collection = 'pg_test_items'")
        .execute(&pool)
        .await?;
    let store = PostgresStore::new(pool);

    let first = store
        .insert("pg_test_items", doc(json!({ "name": "Shirt", "stock": 2 })))
        .await?;
    store
        .insert("pg_test_items", doc(json!({ "name": "Mug", "stock": 9 })))
        .await?;
    let id = first["id"].as_str().unwrap_or_default().to_string();

    let all = store.find_all("pg_test_items").await?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0]["name"], "Shirt");

    let by_name = store
        .find("pg_test_items", &Filter::new().eq("name", "Mug"))
        .await?;
    assert_eq!(by_name.len(), 1);

    assert!(store.decrement_if_at_least("pg_test_items", &id, "stock", 2).await?);
    assert!(!store.decrement_if_at_least("pg_test_items", &id, "stock", 1).await?);

    let updated = store
        .update("pg_test_items", &id, doc(json!({ "name": "Linen Shirt" })))
        .await?
        .expect("document");
    assert_eq!(updated["name"], "Linen Shirt");
    assert_eq!(updated["stock"], 0);

    assert!(store.delete("pg_test_items", &id).await?);
    assert_eq!(store.count("pg_test_items", &Filter::new()).await?, 1);
    Ok(())
}
