//! Typed access to the storage collections.
//!
//! Each repository owns one collection name and converts between stored
//! documents and the structs in [`crate::models`]. Nothing above this layer
//! touches raw documents.

use std::sync::Arc;

use serde_json::Value;

use crate::storage::{Filter, StorageAdapter};

pub mod favorites;
pub mod orders;
pub mod products;
pub mod users;

pub use favorites::FavoriteRepository;
pub use orders::{NewOrder, OrderPatch, OrderRepository};
pub use products::{NewProduct, ProductPatch, ProductRepository};
pub use users::{NewUser, ProfileUpdate, UserRepository};

/// Records that have not been soft-deleted.
pub(crate) fn active() -> Filter {
    Filter::new().eq("deletedAt", Value::Null)
}

#[derive(Clone)]
pub struct Repositories {
    pub users: UserRepository,
    pub products: ProductRepository,
    pub orders: OrderRepository,
    pub favorites: FavoriteRepository,
}

impl Repositories {
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self {
            users: UserRepository::new(store.clone()),
            products: ProductRepository::new(store.clone()),
            orders: OrderRepository::new(store.clone()),
            favorites: FavoriteRepository::new(store),
        }
    }
}
