use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use super::active;
use crate::{
    error::{AppError, AppResult},
    models::{Color, DEFAULT_CATEGORY, Product, SizeStock},
    storage::{Document, StorageAdapter, from_document, now_timestamp, to_document},
};

pub const PRODUCTS: &str = "products";
const STOCK_FIELD: &str = "stock";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub category: String,
    pub stock: i64,
    pub image: String,
    pub gallery: Vec<String>,
    pub colors: Vec<Color>,
    pub sizes: Vec<SizeStock>,
    pub featured: bool,
}

/// Fields left as `None` are not written.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<Color>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<SizeStock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(AppError::Validation("Price cannot be negative".into()));
    }
    Ok(())
}

fn validate_stock(stock: i64) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::Validation("Stock cannot be negative".into()));
    }
    Ok(())
}

fn validate_sizes(sizes: &[SizeStock]) -> AppResult<()> {
    if sizes.iter().any(|s| s.size.trim().is_empty()) {
        return Err(AppError::Validation("Size label cannot be empty".into()));
    }
    if sizes.iter().any(|s| s.stock < 0) {
        return Err(AppError::Validation("Size stock cannot be negative".into()));
    }
    Ok(())
}

fn validate_colors(colors: &[Color]) -> AppResult<()> {
    for color in colors {
        let digits = color.hex.strip_prefix('#').unwrap_or_default();
        let valid = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(AppError::Validation(format!(
                "Invalid color hex `{}`",
                color.hex
            )));
        }
    }
    Ok(())
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Product name is required".into()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ProductRepository {
    store: Arc<dyn StorageAdapter>,
}

impl ProductRepository {
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self { store }
    }

    pub async fn create(&self, mut payload: NewProduct) -> AppResult<Product> {
        validate_name(&payload.name)?;
        validate_price(payload.price)?;
        validate_stock(payload.stock)?;
        validate_sizes(&payload.sizes)?;
        validate_colors(&payload.colors)?;

        payload.name = payload.name.trim().to_string();
        payload.category = match payload.category.trim() {
            "" => DEFAULT_CATEGORY.to_string(),
            category => category.to_string(),
        };

        let doc = to_document(PRODUCTS, &payload)?;
        let saved = self.store.insert(PRODUCTS, doc).await?;
        Ok(from_document(PRODUCTS, saved)?)
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Product>> {
        match self.store.find_one(PRODUCTS, &active().eq("id", id)).await? {
            Some(doc) => Ok(Some(from_document(PRODUCTS, doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_category(&self, category: &str) -> AppResult<Vec<Product>> {
        self.find_many(active().eq("category", category)).await
    }

    /// All live products in insertion order.
    pub async fn list_active(&self) -> AppResult<Vec<Product>> {
        self.find_many(active()).await
    }

    async fn find_many(&self, filter: crate::storage::Filter) -> AppResult<Vec<Product>> {
        self.store
            .find(PRODUCTS, &filter)
            .await?
            .into_iter()
            .map(|doc| from_document(PRODUCTS, doc).map_err(AppError::from))
            .collect()
    }

    pub async fn count_active(&self) -> AppResult<u64> {
        Ok(self.store.count(PRODUCTS, &active()).await?)
    }

    /// Applies a partial update. Returns `None` for unknown or deleted products.
    pub async fn update(
        &self,
        id: &str,
        mut patch: ProductPatch,
    ) -> AppResult<Option<Product>> {
        if let Some(name) = patch.name.as_mut() {
            validate_name(name)?;
            *name = name.trim().to_string();
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        if let Some(stock) = patch.stock {
            validate_stock(stock)?;
        }
        if let Some(sizes) = patch.sizes.as_deref() {
            validate_sizes(sizes)?;
        }
        if let Some(colors) = patch.colors.as_deref() {
            validate_colors(colors)?;
        }
        if let Some(category) = patch.category.as_mut()
            && category.trim().is_empty()
        {
            *category = DEFAULT_CATEGORY.to_string();
        }

        if self.find_by_id(id).await?.is_none() {
            return Ok(None);
        }
        let doc = to_document(PRODUCTS, &patch)?;
        match self.store.update(PRODUCTS, id, doc).await? {
            Some(updated) => Ok(Some(from_document(PRODUCTS, updated)?)),
            None => Ok(None),
        }
    }

    pub async fn soft_delete(&self, id: &str) -> AppResult<bool> {
        if self.find_by_id(id).await?.is_none() {
            return Ok(false);
        }
        let mut patch = Document::new();
        patch.insert("deletedAt".into(), Value::String(now_timestamp()));
        Ok(self.store.update(PRODUCTS, id, patch).await?.is_some())
    }

    /// Atomically takes `quantity` units; `false` when not enough stock remains.
    pub async fn decrement_stock(&self, id: &str, quantity: i64) -> AppResult<bool> {
        Ok(self
            .store
            .decrement_if_at_least(PRODUCTS, id, STOCK_FIELD, quantity)
            .await?)
    }

    /// Puts back units taken by [`Self::decrement_stock`].
    pub async fn restore_stock(&self, id: &str, quantity: i64) -> AppResult<()> {
        self.store
            .decrement_if_at_least(PRODUCTS, id, STOCK_FIELD, -quantity)
            .await?;
        Ok(())
    }

    /// Moves stock by `delta` without ever going below zero.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> AppResult<Product> {
        let product = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))?;
        if delta == 0 {
            return Ok(product);
        }
        let amount = delta
            .checked_neg()
            .ok_or_else(|| AppError::Validation("Stock adjustment is too large".into()))?;
        if !self.decrement_stock(id, amount).await? {
            return Err(AppError::Validation("Stock cannot be negative".into()));
        }
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))
    }
}
