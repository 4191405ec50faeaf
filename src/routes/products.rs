use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::{
    dto::products::{CatalogPage, CreateProductRequest, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::params::{ProductQuery, parse_param},
    services::product_service,
    state::AppState,
    uploads::ImageUpload,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

/// Text fields and the optional `image` file of a product form.
#[derive(Debug, Default)]
pub struct ProductForm {
    fields: HashMap<String, String>,
    image: Option<ImageUpload>,
}

impl ProductForm {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = ProductForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                if !file_name.is_empty() && !bytes.is_empty() {
                    form.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    fn text(&self, key: &str) -> Option<String> {
        self.fields.get(key).cloned()
    }

    fn json<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        match self.fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|_| AppError::Validation(format!("Invalid JSON in `{key}`"))),
            None => Ok(None),
        }
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.fields
            .get(key)
            .map(|v| matches!(v.trim(), "true" | "1" | "on" | "yes"))
    }

    pub fn into_update(self) -> AppResult<(UpdateProductRequest, Option<ImageUpload>)> {
        let update = UpdateProductRequest {
            name: self.text("name"),
            price: parse_param::<Decimal>("price", self.fields.get("price").map(String::as_str))?,
            description: self.text("description"),
            category: self.text("category"),
            stock: parse_param::<i64>("stock", self.fields.get("stock").map(String::as_str))?,
            image: None,
            gallery: self.json("gallery")?,
            colors: self.json("colors")?,
            sizes: self.json("sizes")?,
            featured: self.flag("featured"),
        };
        Ok((update, self.image))
    }

    pub fn into_create(self) -> AppResult<(CreateProductRequest, Option<ImageUpload>)> {
        let (update, image) = self.into_update()?;
        let (Some(name), Some(price)) = (update.name, update.price) else {
            return Err(AppError::Validation("Name and price are required".into()));
        };
        let create = CreateProductRequest {
            name,
            price,
            description: update.description.unwrap_or_default(),
            category: update.category.unwrap_or_default(),
            stock: update.stock.unwrap_or_default(),
            image: String::new(),
            gallery: update.gallery.unwrap_or_default(),
            colors: update.colors.unwrap_or_default(),
            sizes: update.sizes.unwrap_or_default(),
            featured: update.featured.unwrap_or_default(),
        };
        Ok((create, image))
    }
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Filtered, sorted and paginated catalog", body = ApiResponse<CatalogPage>),
        (status = 400, description = "Malformed number in query"),
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<CatalogPage>>> {
    let resp = product_service::list_products(&state, query.into_filter()?).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, &id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body(content = CreateProductRequest, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Create product", body = ApiResponse<Product>),
        (status = 400, description = "Invalid product data"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let (payload, image) = ProductForm::from_multipart(multipart).await?.into_create()?;
    let resp = product_service::create_product(&state, &user, payload, image).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    request_body(content = UpdateProductRequest, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>),
        (status = 400, description = "Invalid product data"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    let (payload, image) = ProductForm::from_multipart(multipart).await?.into_update()?;
    let resp = product_service::update_product(&state, &user, &id, payload, image).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product soft-deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &user, &id).await?;
    Ok(Json(resp))
}
