#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use storefront_api::{
    config::{AppConfig, PaymentMode, StorageBackend},
    middleware::auth::AuthUser,
    models::{CustomerInfo, Product, Role},
    repositories::{NewProduct, NewUser},
    state::AppState,
    storage::MemoryStore,
};

pub fn test_config() -> AppConfig {
    AppConfig {
        storage: StorageBackend::Memory,
        db_max_connections: 1,
        db_acquire_timeout_secs: 1,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_ttl_hours: 1,
        upload_dir: std::env::temp_dir().join("storefront-api-test-uploads"),
        max_upload_bytes: 1024 * 1024,
        low_stock_threshold: 5,
        default_country: "Tunisia".into(),
        payment_mode: PaymentMode::Approve,
        smtp: None,
    }
}

pub fn memory_state() -> AppState {
    AppState::new(test_config(), Arc::new(MemoryStore::new()))
}

pub async fn create_user(state: &AppState, email: &str, role: Role) -> anyhow::Result<AuthUser> {
    let user = state
        .users
        .create(NewUser {
            name: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            password: "secret123".into(),
            role,
            ..Default::default()
        })
        .await?;
    Ok(AuthUser::from(&user))
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i64,
) -> anyhow::Result<Product> {
    let product = state
        .products
        .create(NewProduct {
            name: name.into(),
            price: Decimal::from(price),
            category: "shirts".into(),
            stock,
            ..Default::default()
        })
        .await?;
    Ok(product)
}

pub fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Sam Doe".into(),
        email: "sam@example.com".into(),
        phone: "+21600000000".into(),
        address: "1 Main Street".into(),
        city: "Tunis".into(),
    }
}
