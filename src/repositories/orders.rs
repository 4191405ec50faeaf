use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::{CustomerInfo, Order, OrderItem, OrderStatus, ShippingAddress},
    storage::{Filter, StorageAdapter, from_document, new_id, to_document},
};

pub const ORDERS: &str = "orders";

/// Everything needed to persist a freshly checked-out order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub user: Option<String>,
    pub customer_info: CustomerInfo,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub status: OrderStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredOrder<'a> {
    id: &'a str,
    order_number: String,
    #[serde(flatten)]
    order: &'a NewOrder,
}

/// Fields an order may change after creation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Short customer-facing reference: the last six characters of the id.
pub fn order_number(id: &str) -> String {
    let start = id.len().saturating_sub(6);
    id.get(start..).unwrap_or(id).to_ascii_uppercase()
}

#[derive(Clone)]
pub struct OrderRepository {
    store: Arc<dyn StorageAdapter>,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self { store }
    }

    pub async fn create(&self, order: &NewOrder) -> AppResult<Order> {
        if order.items.is_empty() {
            return Err(AppError::Validation("Order has no items".into()));
        }
        let id = new_id();
        let doc = to_document(
            ORDERS,
            &StoredOrder {
                id: &id,
                order_number: order_number(&id),
                order,
            },
        )?;
        let saved = self.store.insert(ORDERS, doc).await?;
        Ok(from_document(ORDERS, saved)?)
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Order>> {
        match self.store.find_one(ORDERS, &Filter::new().eq("id", id)).await? {
            Some(doc) => Ok(Some(from_document(ORDERS, doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Order>> {
        self.find_many(Filter::new().eq("user", user_id)).await
    }

    pub async fn find_by_status(&self, status: OrderStatus) -> AppResult<Vec<Order>> {
        self.find_many(Filter::new().eq("status", status.as_str())).await
    }

    pub async fn list_all(&self) -> AppResult<Vec<Order>> {
        self.find_many(Filter::new()).await
    }

    async fn find_many(&self, filter: Filter) -> AppResult<Vec<Order>> {
        self.store
            .find(ORDERS, &filter)
            .await?
            .into_iter()
            .map(|doc| from_document(ORDERS, doc).map_err(AppError::from))
            .collect()
    }

    pub async fn update(&self, id: &str, patch: &OrderPatch) -> AppResult<Option<Order>> {
        let doc = to_document(ORDERS, patch)?;
        match self.store.update(ORDERS, id, doc).await? {
            Some(updated) => Ok(Some(from_document(ORDERS, updated)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        Ok(self.store.delete(ORDERS, id).await?)
    }

    pub async fn count(&self) -> AppResult<u64> {
        Ok(self.store.count(ORDERS, &Filter::new()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, now_timestamp};

    fn repo() -> OrderRepository {
        OrderRepository::new(Arc::new(MemoryStore::new()))
    }

    fn new_order(user: Option<&str>) -> NewOrder {
        NewOrder {
            user: user.map(str::to_string),
            customer_info: CustomerInfo {
                name: "Amira".into(),
                email: "a@x.com".into(),
                ..Default::default()
            },
            items: vec![OrderItem {
                product: "p1".into(),
                name: "Shirt".into(),
                price: Decimal::from(20),
                quantity: 2,
                image: String::new(),
            }],
            total: Decimal::from(40),
            shipping_address: ShippingAddress::default(),
            payment_method: "card".into(),
            status: OrderStatus::Pending,
        }
    }

    #[test]
    fn order_number_is_id_tail() {
        assert_eq!(order_number("0f8b1c2d-aaaa-bbbb-cccc-1234567890ab"), "7890AB");
        assert_eq!(order_number("abc"), "ABC");
    }

    #[tokio::test]
    async fn create_assigns_order_number_from_id() {
        let orders = repo();
        let order = orders.create(&new_order(Some("u1"))).await.unwrap();
        assert_eq!(order.order_number, order_number(&order.id));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Decimal::from(40));
    }

    #[tokio::test]
    async fn find_by_user_skips_guests_and_others() {
        let orders = repo();
        orders.create(&new_order(Some("u1"))).await.unwrap();
        orders.create(&new_order(None)).await.unwrap();
        orders.create(&new_order(Some("u2"))).await.unwrap();

        assert_eq!(orders.find_by_user("u1").await.unwrap().len(), 1);
        assert_eq!(orders.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn update_patches_only_given_fields() {
        let orders = repo();
        let order = orders.create(&new_order(Some("u1"))).await.unwrap();
        let updated = orders
            .update(
                &order.id,
                &OrderPatch {
                    status: Some(OrderStatus::Paid),
                    payment_date: Some(now_timestamp()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Paid);
        assert!(updated.payment_date.is_some());
        assert!(updated.tracking_number.is_none());
        assert_eq!(updated.items.len(), 1);
        assert_eq!(orders.find_by_status(OrderStatus::Paid).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_order() {
        let orders = repo();
        let order = orders.create(&new_order(None)).await.unwrap();
        assert!(orders.delete(&order.id).await.unwrap());
        assert!(orders.find_by_id(&order.id).await.unwrap().is_none());
        assert!(!orders.delete(&order.id).await.unwrap());
    }
}
