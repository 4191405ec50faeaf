mod common;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use storefront_api::{
    config::PaymentMode,
    dto::orders::{CheckoutItem, CreateOrderRequest, ProcessPaymentRequest, UpdateOrderStatusRequest},
    error::AppError,
    models::{Order, OrderStatus, Role},
    notify::{Notifier, NotifyError},
    payment::MockPaymentGateway,
    services::order_service,
    state::AppState,
};

use common::{create_product, create_user, customer, memory_state};

fn request(product_id: &str, quantity: i64) -> CreateOrderRequest {
    CreateOrderRequest {
        items: vec![CheckoutItem {
            product_id: product_id.to_string(),
            quantity,
        }],
        customer_info: Some(customer()),
        ..Default::default()
    }
}

async fn stock_of(state: &AppState, id: &str) -> i64 {
    state
        .products
        .find_by_id(id)
        .await
        .expect("lookup")
        .expect("product")
        .stock
}

async fn load(state: &AppState, id: &str) -> Order {
    state
        .orders
        .find_by_id(id)
        .await
        .expect("lookup")
        .expect("order")
}

#[tokio::test]
async fn checkout_uses_catalog_prices_and_takes_stock() -> anyhow::Result<()> {
    let state = memory_state();
    let shirt = create_product(&state, "Shirt", 25, 2).await?;

    let payload: CreateOrderRequest = serde_json::from_value(json!({
        "items": [{ "id": shirt.id, "quantity": 2, "price": 1, "name": "Cheap" }],
        "customerInfo": { "name": "Sam Doe", "email": "sam@example.com", "city": "Tunis" }
    }))?;
    let resp = order_service::checkout(&state, None, payload).await?;
    let summary = resp.data.expect("order summary").order;

    assert_eq!(summary.total, Decimal::from(50));
    assert_eq!(summary.status, OrderStatus::Pending);
    assert_eq!(summary.order_number.len(), 6);
    assert!(summary.id.to_uppercase().ends_with(&summary.order_number));
    assert_eq!(stock_of(&state, &shirt.id).await, 0);

    let order = load(&state, &summary.id).await;
    assert_eq!(order.user, None);
    assert_eq!(order.items[0].name, "Shirt");
    assert_eq!(order.items[0].price, Decimal::from(25));
    assert_eq!(order.payment_method, "card");
    assert_eq!(order.shipping_address.city, "Tunis");
    assert_eq!(order.shipping_address.country, "Tunisia");

    let err = order_service::checkout(&state, None, request(&shirt.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 0, .. }));
    Ok(())
}

#[tokio::test]
async fn rejected_checkout_leaves_stock_untouched() -> anyhow::Result<()> {
    let state = memory_state();
    let shirt = create_product(&state, "Shirt", 25, 2).await?;
    let mug = create_product(&state, "Mug", 8, 10).await?;

    let mut payload = request(&mug.id, 3);
    payload.items.push(CheckoutItem {
        product_id: shirt.id.clone(),
        quantity: 3,
    });
    let err = order_service::checkout(&state, None, payload).await.unwrap_err();

    match err {
        AppError::InsufficientStock { product, available } => {
            assert_eq!(product, "Shirt");
            assert_eq!(available, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(stock_of(&state, &shirt.id).await, 2);
    assert_eq!(stock_of(&state, &mug.id).await, 10);
    assert_eq!(state.orders.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn checkout_requires_items_and_customer() -> anyhow::Result<()> {
    let state = memory_state();
    let shirt = create_product(&state, "Shirt", 25, 2).await?;

    let empty = CreateOrderRequest {
        customer_info: Some(customer()),
        ..Default::default()
    };
    let err = order_service::checkout(&state, None, empty).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut anonymous = request(&shirt.id, 1);
    anonymous.customer_info = None;
    let err = order_service::checkout(&state, None, anonymous).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = order_service::checkout(&state, None, request("missing", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(stock_of(&state, &shirt.id).await, 2);
    Ok(())
}

#[tokio::test]
async fn overflowing_quantities_are_rejected() -> anyhow::Result<()> {
    let state = memory_state();
    let shirt = create_product(&state, "Shirt", 25, 2).await?;

    let mut payload = request(&shirt.id, i64::MAX);
    payload.items.push(CheckoutItem {
        product_id: shirt.id.clone(),
        quantity: 2,
    });
    let err = order_service::checkout(&state, None, payload).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(stock_of(&state, &shirt.id).await, 2);
    assert_eq!(state.orders.count().await?, 0);

    let err = order_service::checkout(&state, None, request(&shirt.id, i64::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 2, .. }));
    assert_eq!(stock_of(&state, &shirt.id).await, 2);
    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() -> anyhow::Result<()> {
    let state = memory_state();
    let shirt = create_product(&state, "Shirt", 25, 2).await?;

    let (first, second) = tokio::join!(
        order_service::checkout(&state, None, request(&shirt.id, 2)),
        order_service::checkout(&state, None, request(&shirt.id, 2)),
    );

    assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(stock_of(&state, &shirt.id).await, 0);
    assert_eq!(state.orders.count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn paid_and_shipped_order_cannot_be_cancelled() -> anyhow::Result<()> {
    let state = memory_state();
    let client = create_user(&state, "client@example.com", Role::Client).await?;
    let admin = create_user(&state, "admin@example.com", Role::Admin).await?;
    let shirt = create_product(&state, "Shirt", 25, 5).await?;

    let order_id = order_service::checkout(&state, Some(&client), request(&shirt.id, 1))
        .await?
        .data
        .expect("order")
        .order
        .id;
    assert_eq!(load(&state, &order_id).await.user.as_deref(), Some(client.user_id.as_str()));

    let paid = order_service::process_payment(
        &state,
        &client,
        ProcessPaymentRequest {
            order_id: order_id.clone(),
        },
    )
    .await?
    .data
    .expect("payment result");
    assert!(paid.success);
    assert!(paid.payment_reference.starts_with("MOCK-"));

    let order = load(&state, &order_id).await;
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.payment_date.is_some());

    let shipped = order_service::update_order_status(
        &state,
        &admin,
        &order_id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
            tracking_number: Some("TRK-1".into()),
            notes: None,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert!(shipped.shipping_date.is_some());
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRK-1"));

    let err = order_service::cancel_order(&state, &client, &order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatus(_)));

    let err = order_service::update_order_status(
        &state,
        &admin,
        &order_id,
        UpdateOrderStatusRequest {
            status: "pending".into(),
            tracking_number: None,
            notes: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatus(_)));
    Ok(())
}

#[tokio::test]
async fn orders_are_private_to_owner_and_admin() -> anyhow::Result<()> {
    let state = memory_state();
    let owner = create_user(&state, "owner@example.com", Role::Client).await?;
    let other = create_user(&state, "other@example.com", Role::Client).await?;
    let admin = create_user(&state, "admin@example.com", Role::Admin).await?;
    let shirt = create_product(&state, "Shirt", 25, 5).await?;

    let order_id = order_service::checkout(&state, Some(&owner), request(&shirt.id, 1))
        .await?
        .data
        .expect("order")
        .order
        .id;

    assert!(order_service::get_order(&state, &owner, &order_id).await.is_ok());
    assert!(order_service::get_order(&state, &admin, &order_id).await.is_ok());
    let err = order_service::get_order(&state, &other, &order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = order_service::cancel_order(&state, &other, &order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let mine = order_service::my_orders(&state, &other).await?.data.expect("orders");
    assert!(mine.items.is_empty());

    let cancelled = order_service::cancel_order(&state, &owner, &order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    Ok(())
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn order_confirmation(&self, _order: &Order) -> Result<(), NotifyError> {
        Err(NotifyError::Other("mail server unreachable".into()))
    }
}

#[tokio::test]
async fn failing_notifier_does_not_fail_checkout() -> anyhow::Result<()> {
    let state = memory_state().with_notifier(Arc::new(FailingNotifier));
    let shirt = create_product(&state, "Shirt", 25, 2).await?;

    let resp = order_service::checkout(&state, None, request(&shirt.id, 1)).await?;

    assert_eq!(resp.message, "Order created");
    assert_eq!(stock_of(&state, &shirt.id).await, 1);
    assert_eq!(state.orders.count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn declined_payment_keeps_order_pending() -> anyhow::Result<()> {
    let state =
        memory_state().with_payments(Arc::new(MockPaymentGateway::new(PaymentMode::Decline)));
    let client = create_user(&state, "client@example.com", Role::Client).await?;
    let shirt = create_product(&state, "Shirt", 25, 2).await?;

    let order_id = order_service::checkout(&state, Some(&client), request(&shirt.id, 1))
        .await?
        .data
        .expect("order")
        .order
        .id;
    let err = order_service::process_payment(
        &state,
        &client,
        ProcessPaymentRequest {
            order_id: order_id.clone(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::PaymentDeclined(_)));
    let order = load(&state, &order_id).await;
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.payment_reference.is_none());
    Ok(())
}
