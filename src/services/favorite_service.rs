use serde_json::json;

use crate::{
    audit,
    dto::favorites::{AddFavoriteRequest, FavoriteProductList, FavoriteStatus},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Favorite,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Favorited products that are still live, newest favorite first.
pub async fn list_favorites(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<FavoriteProductList>> {
    let favorites = state.favorites.find_by_user(&user.user_id).await?;
    let mut products = Vec::with_capacity(favorites.len());
    for favorite in favorites {
        if let Some(product) = state.products.find_by_id(&favorite.product).await? {
            products.push(product);
        }
    }

    let total = products.len() as u64;
    let meta = Meta::new(1, total, total);
    Ok(ApiResponse::success(
        "OK",
        FavoriteProductList { items: products },
        Some(meta),
    ))
}

pub async fn add_favorite(
    state: &AppState,
    user: &AuthUser,
    payload: AddFavoriteRequest,
) -> AppResult<ApiResponse<Favorite>> {
    if state.products.find_by_id(&payload.product_id).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }
    let favorite = state
        .favorites
        .create(&user.user_id, &payload.product_id)
        .await?;

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "favorite_add",
        "favorites",
        json!({ "product_id": payload.product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to favorites",
        favorite,
        Some(Meta::empty()),
    ))
}

pub async fn remove_favorite(
    state: &AppState,
    user: &AuthUser,
    product_id: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if !state
        .favorites
        .delete_by_user_and_product(&user.user_id, product_id)
        .await?
    {
        return Err(AppError::not_found("Favorite"));
    }

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "favorite_remove",
        "favorites",
        json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from favorites",
        json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn check_favorite(
    state: &AppState,
    user: &AuthUser,
    product_id: &str,
) -> AppResult<ApiResponse<FavoriteStatus>> {
    let is_favorite = state
        .favorites
        .find_by_user_and_product(&user.user_id, product_id)
        .await?
        .is_some();
    Ok(ApiResponse::success(
        "OK",
        FavoriteStatus { is_favorite },
        Some(Meta::empty()),
    ))
}
