mod common;

use std::{path::Path, sync::Arc};

use rust_decimal::Decimal;
use storefront_api::{
    dto::products::{CreateProductRequest, UpdateProductRequest},
    error::AppError,
    models::Role,
    services::product_service,
    state::AppState,
    storage::MemoryStore,
    uploads::ImageUpload,
};

use common::{create_product, create_user, test_config};

fn state_with_uploads(dir: &Path) -> AppState {
    let mut config = test_config();
    config.upload_dir = dir.to_path_buf();
    AppState::new(config, Arc::new(MemoryStore::new()))
}

fn png() -> ImageUpload {
    ImageUpload {
        file_name: "shirt.png".into(),
        content_type: Some("image/png".into()),
        bytes: b"png".to_vec(),
    }
}

fn stored_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn rejected_create_leaves_no_image_behind() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with_uploads(dir.path());
    let admin = create_user(&state, "admin@x.com", Role::Admin).await.unwrap();

    let invalid = CreateProductRequest {
        name: "Shirt".into(),
        price: Decimal::from(-5),
        ..Default::default()
    };
    let err = product_service::create_product(&state, &admin, invalid, Some(png()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(stored_files(dir.path()), 0);
    assert!(state.products.list_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn accepted_create_keeps_its_image() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with_uploads(dir.path());
    let admin = create_user(&state, "admin@x.com", Role::Admin).await.unwrap();

    let valid = CreateProductRequest {
        name: "Shirt".into(),
        price: Decimal::from(5),
        ..Default::default()
    };
    let response = product_service::create_product(&state, &admin, valid, Some(png()))
        .await
        .unwrap();

    let product = response.data.unwrap();
    assert!(product.image.starts_with("/uploads/"));
    assert_eq!(stored_files(dir.path()), 1);
}

#[tokio::test]
async fn rejected_update_leaves_no_image_behind() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with_uploads(dir.path());
    let admin = create_user(&state, "admin@x.com", Role::Admin).await.unwrap();
    let product = create_product(&state, "Shirt", 20, 3).await.unwrap();

    let invalid = UpdateProductRequest {
        stock: Some(-1),
        ..Default::default()
    };
    let err = product_service::update_product(&state, &admin, &product.id, invalid, Some(png()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(stored_files(dir.path()), 0);
    let current = state.products.find_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(current.image, product.image);
}
