use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    error::{AppError, AppResult},
    models::Favorite,
    storage::{Filter, StorageAdapter, StorageError, doc_id, from_document},
};

pub const FAVORITES: &str = "favorites";

/// One document per pair, so the store's id uniqueness rejects a second insert.
fn pair_id(user_id: &str, product_id: &str) -> String {
    format!("{user_id}:{product_id}")
}

fn pair(user_id: &str, product_id: &str) -> Filter {
    Filter::new().eq("user", user_id).eq("product", product_id)
}

#[derive(Clone)]
pub struct FavoriteRepository {
    store: Arc<dyn StorageAdapter>,
}

impl FavoriteRepository {
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self { store }
    }

    /// Fails with `Conflict` when the user already favorited the product.
    pub async fn create(&self, user_id: &str, product_id: &str) -> AppResult<Favorite> {
        if self.find_by_user_and_product(user_id, product_id).await?.is_some() {
            return Err(AppError::Conflict("Product already in favorites".into()));
        }
        let mut doc = Map::new();
        doc.insert("id".into(), Value::from(pair_id(user_id, product_id)));
        doc.insert("user".into(), Value::from(user_id));
        doc.insert("product".into(), Value::from(product_id));
        let saved = match self.store.insert(FAVORITES, doc).await {
            Ok(saved) => saved,
            Err(StorageError::DuplicateId { .. }) => {
                return Err(AppError::Conflict("Product already in favorites".into()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(from_document(FAVORITES, saved)?)
    }

    /// Newest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Favorite>> {
        let mut favorites = self
            .store
            .find(FAVORITES, &Filter::new().eq("user", user_id))
            .await?
            .into_iter()
            .map(|doc| from_document(FAVORITES, doc).map_err(AppError::from))
            .collect::<AppResult<Vec<Favorite>>>()?;
        favorites.reverse();
        Ok(favorites)
    }

    pub async fn find_by_user_and_product(
        &self,
        user_id: &str,
        product_id: &str,
    ) -> AppResult<Option<Favorite>> {
        match self.store.find_one(FAVORITES, &pair(user_id, product_id)).await? {
            Some(doc) => Ok(Some(from_document(FAVORITES, doc)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_by_user_and_product(&self, user_id: &str, product_id: &str) -> AppResult<bool> {
        let matches = self.store.find(FAVORITES, &pair(user_id, product_id)).await?;
        let mut removed = false;
        for doc in &matches {
            if let Some(id) = doc_id(doc) {
                removed |= self.store.delete(FAVORITES, id).await?;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn repo() -> FavoriteRepository {
        FavoriteRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn duplicate_pair_conflicts() {
        let favorites = repo();
        favorites.create("u1", "p1").await.unwrap();
        assert!(matches!(
            favorites.create("u1", "p1").await,
            Err(AppError::Conflict(_))
        ));
        favorites.create("u2", "p1").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_store_one_favorite() {
        let favorites = repo();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let favorites = favorites.clone();
                tokio::spawn(async move { favorites.create("u1", "p1").await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(favorite) => {
                    assert_eq!(favorite.id, "u1:p1");
                    created += 1;
                }
                Err(AppError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(favorites.find_by_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_by_user_returns_newest_first() {
        let favorites = repo();
        favorites.create("u1", "p1").await.unwrap();
        favorites.create("u1", "p2").await.unwrap();
        favorites.create("u2", "p3").await.unwrap();

        let products: Vec<String> = favorites
            .find_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.product)
            .collect();
        assert_eq!(products, ["p2", "p1"]);
    }

    #[tokio::test]
    async fn delete_is_scoped_to_the_pair() {
        let favorites = repo();
        favorites.create("u1", "p1").await.unwrap();
        favorites.create("u2", "p1").await.unwrap();

        assert!(favorites.delete_by_user_and_product("u1", "p1").await.unwrap());
        assert!(!favorites.delete_by_user_and_product("u1", "p1").await.unwrap());
        assert!(
            favorites
                .find_by_user_and_product("u2", "p1")
                .await
                .unwrap()
                .is_some()
        );
    }
}
