use serde_json::json;

use crate::{
    audit,
    dto::products::{CatalogPage, CreateProductRequest, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    repositories::{NewProduct, ProductPatch},
    response::{ApiResponse, Meta},
    services::catalog::{CatalogFilter, query_catalog},
    state::AppState,
    uploads::{ImageUpload, remove_image},
};

pub async fn list_products(
    state: &AppState,
    filter: CatalogFilter,
) -> AppResult<ApiResponse<CatalogPage>> {
    let products = state.products.list_active().await?;
    let page = query_catalog(products, &filter);
    let meta = Meta::new(
        page.pagination.current_page,
        filter.limit,
        page.pagination.total_products,
    );
    Ok(ApiResponse::success("Products", page, Some(meta)))
}

pub async fn get_product(state: &AppState, id: &str) -> AppResult<ApiResponse<Product>> {
    let product = state
        .products
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success("Product", product, Some(Meta::empty())))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
    image: Option<ImageUpload>,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let mut product: NewProduct = payload.into();
    let stored = match image {
        Some(image) => Some(
            image
                .store(&state.config.upload_dir, state.config.max_upload_bytes)
                .await?,
        ),
        None => None,
    };
    if let Some(url) = &stored {
        product.image = url.clone();
    }
    let product = match state.products.create(product).await {
        Ok(product) => product,
        Err(err) => {
            discard_upload(state, stored.as_deref()).await;
            return Err(err);
        }
    };

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "product_create",
        "products",
        json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    payload: UpdateProductRequest,
    image: Option<ImageUpload>,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if state.products.find_by_id(id).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }
    let mut patch: ProductPatch = payload.into();
    let stored = match image {
        Some(image) => Some(
            image
                .store(&state.config.upload_dir, state.config.max_upload_bytes)
                .await?,
        ),
        None => None,
    };
    if stored.is_some() {
        patch.image = stored.clone();
    }
    let product = match state.products.update(id, patch).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            discard_upload(state, stored.as_deref()).await;
            return Err(AppError::not_found("Product"));
        }
        Err(err) => {
            discard_upload(state, stored.as_deref()).await;
            return Err(err);
        }
    };

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "product_update",
        "products",
        json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if !state.products.soft_delete(id).await? {
        return Err(AppError::not_found("Product"));
    }

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "product_delete",
        "products",
        json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted",
        json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

/// Drops an image stored for a write that did not go through.
async fn discard_upload(state: &AppState, url: Option<&str>) {
    if let Some(url) = url {
        remove_image(&state.config.upload_dir, url).await;
    }
}
