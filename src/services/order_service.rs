use rust_decimal::Decimal;
use serde_json::json;

use crate::{
    audit,
    dto::orders::{
        AdminOrderList, CheckoutItem, CheckoutResponse, CreateOrderRequest, OrderList,
        OrderSummary, PaymentResult, ProcessPaymentRequest, StatusCount, UpdateOrderStatusRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, OrderStatus, ShippingAddress},
    payment::PaymentOutcome,
    repositories::{NewOrder, OrderPatch},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination},
    state::AppState,
    storage::now_timestamp,
};

pub const DEFAULT_PAYMENT_METHOD: &str = "card";
const ADMIN_PAGE_SIZE: u64 = 20;

/// Collapses repeated lines for one product, keeping first-seen order.
fn merge_lines(items: &[CheckoutItem]) -> AppResult<Vec<(String, i64)>> {
    let mut lines: Vec<(String, i64)> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity < 1 {
            return Err(AppError::Validation(
                "Quantity must be at least 1".into(),
            ));
        }
        let product_id = item.product_id.trim();
        if product_id.is_empty() {
            return Err(AppError::Validation("Product id is required".into()));
        }
        match lines.iter_mut().find(|(id, _)| id == product_id) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| AppError::Validation("Quantity is too large".into()))?;
            }
            None => lines.push((product_id.to_string(), item.quantity)),
        }
    }
    Ok(lines)
}

async fn restore_taken(state: &AppState, taken: &[(String, i64)]) {
    for (product_id, quantity) in taken {
        if let Err(err) = state.products.restore_stock(product_id, *quantity).await {
            tracing::error!(error = %err, product_id = %product_id, quantity, "failed to restore stock");
        }
    }
}

/// Newest first.
fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.reverse();
    orders
}

pub fn status_counts(orders: &[Order]) -> Vec<StatusCount> {
    OrderStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: orders.iter().filter(|o| o.status == status).count() as u64,
        })
        .collect()
}

fn owned_by(order: &Order, user: &AuthUser) -> bool {
    order.user.as_deref() == Some(user.user_id.as_str())
}

async fn load_order(state: &AppState, id: &str) -> AppResult<Order> {
    state
        .orders
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

pub async fn checkout(
    state: &AppState,
    caller: Option<&AuthUser>,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let CreateOrderRequest {
        items,
        customer_info,
        shipping_address,
        payment_method,
    } = payload;

    if items.is_empty() {
        return Err(AppError::Validation("Cart is empty".into()));
    }
    let customer = customer_info
        .filter(|c| !c.name.trim().is_empty() && !c.email.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Customer name and email are required".into()))?;
    let lines = merge_lines(&items)?;

    let mut snapshot: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (product_id, quantity) in &lines {
        let product = state
            .products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {product_id} not found")))?;
        if *quantity > product.stock {
            return Err(AppError::InsufficientStock {
                product: product.name,
                available: product.stock,
            });
        }
        snapshot.push(OrderItem {
            product: product.id,
            name: product.name,
            price: product.price,
            quantity: *quantity,
            image: product.image,
        });
    }
    let total = snapshot
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| {
            item.checked_line_total().and_then(|line| sum.checked_add(line))
        })
        .ok_or_else(|| AppError::Validation("Order total is too large".into()))?;

    let mut taken: Vec<(String, i64)> = Vec::with_capacity(snapshot.len());
    for item in &snapshot {
        match state.products.decrement_stock(&item.product, item.quantity).await {
            Ok(true) => taken.push((item.product.clone(), item.quantity)),
            Ok(false) => {
                restore_taken(state, &taken).await;
                let available = match state.products.find_by_id(&item.product).await {
                    Ok(Some(product)) => product.stock,
                    _ => 0,
                };
                return Err(AppError::InsufficientStock {
                    product: item.name.clone(),
                    available,
                });
            }
            Err(err) => {
                restore_taken(state, &taken).await;
                return Err(err);
            }
        }
    }

    let shipping_address = shipping_address.unwrap_or_else(|| ShippingAddress {
        street: customer.address.clone(),
        city: customer.city.clone(),
        postal_code: String::new(),
        country: state.config.default_country.clone(),
    });
    let payment_method = payment_method
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

    let new_order = NewOrder {
        user: caller.map(|u| u.user_id.clone()),
        customer_info: customer,
        items: snapshot,
        total,
        shipping_address,
        payment_method,
        status: OrderStatus::Pending,
    };
    let order = match state.orders.create(&new_order).await {
        Ok(order) => order,
        Err(err) => {
            restore_taken(state, &taken).await;
            return Err(err);
        }
    };
    tracing::info!(order_id = %order.id, total = %order.total, "order created");

    if let Err(err) = state.notifier.order_confirmation(&order).await {
        tracing::warn!(error = %err, order_id = %order.id, "order confirmation failed");
    }

    audit::record(
        state.store.as_ref(),
        caller.map(|u| u.user_id.as_str()),
        "checkout",
        "orders",
        json!({ "order_id": order.id, "total": order.total }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        CheckoutResponse {
            order: OrderSummary::from(&order),
        },
        Some(Meta::empty()),
    ))
}

pub async fn my_orders(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderList>> {
    let orders = newest_first(state.orders.find_by_user(&user.user_id).await?);
    let total = orders.len() as u64;
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_order(state: &AppState, user: &AuthUser, id: &str) -> AppResult<ApiResponse<Order>> {
    let order = load_order(state, id).await?;
    if !owned_by(&order, user) && !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

/// Owner-initiated cancellation. Stock is not returned.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> AppResult<ApiResponse<Order>> {
    let order = load_order(state, id).await?;
    if !owned_by(&order, user) {
        return Err(AppError::Forbidden);
    }
    if !order.status.is_cancellable() {
        return Err(AppError::InvalidStatus(format!(
            "Order cannot be cancelled once {}",
            order.status
        )));
    }

    let patch = OrderPatch {
        status: Some(OrderStatus::Cancelled),
        ..Default::default()
    };
    let order = state
        .orders
        .update(id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "order_cancel",
        "orders",
        json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success("Order cancelled", order, Some(Meta::empty())))
}

pub async fn process_payment(
    state: &AppState,
    user: &AuthUser,
    payload: ProcessPaymentRequest,
) -> AppResult<ApiResponse<PaymentResult>> {
    let order = load_order(state, &payload.order_id).await?;
    if !owned_by(&order, user) {
        return Err(AppError::Forbidden);
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::InvalidStatus(format!(
            "Order is {} and cannot be paid",
            order.status
        )));
    }

    let reference = match state.payments.charge(&order).await? {
        PaymentOutcome::Approved { reference } => reference,
        PaymentOutcome::Declined { reason } => {
            tracing::info!(order_id = %order.id, reason = %reason, "payment declined");
            return Err(AppError::PaymentDeclined(reason));
        }
    };

    let patch = OrderPatch {
        status: Some(OrderStatus::Paid),
        payment_date: Some(now_timestamp()),
        payment_reference: Some(reference.clone()),
        ..Default::default()
    };
    let order = state
        .orders
        .update(&order.id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "order_paid",
        "orders",
        json!({ "order_id": order.id, "reference": reference }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment processed",
        PaymentResult {
            success: true,
            order_id: order.id,
            payment_reference: reference,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<AdminOrderList>> {
    ensure_admin(user)?;
    let pagination = Pagination::parse(query.page.as_deref(), query.limit.as_deref(), ADMIN_PAGE_SIZE)?;
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<OrderStatus>().map_err(AppError::InvalidStatus)?),
    };

    let all = newest_first(state.orders.list_all().await?);
    let stats = status_counts(&all);
    let matching: Vec<Order> = match status {
        Some(status) => all.into_iter().filter(|o| o.status == status).collect(),
        None => all,
    };

    let total = matching.len() as u64;
    let orders = pagination.slice(matching);
    let meta = Meta::new(pagination.page, pagination.limit, total);
    Ok(ApiResponse::success(
        "Orders",
        AdminOrderList { orders, stats },
        Some(meta),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let next: OrderStatus = payload
        .status
        .trim()
        .parse()
        .map_err(AppError::InvalidStatus)?;
    let order = load_order(state, id).await?;
    if !order.status.can_transition_to(next) {
        return Err(AppError::InvalidStatus(format!(
            "Cannot change status from {} to {}",
            order.status, next
        )));
    }

    let now = now_timestamp();
    let mut patch = OrderPatch {
        status: Some(next),
        tracking_number: payload.tracking_number,
        notes: payload.notes,
        ..Default::default()
    };
    match next {
        OrderStatus::Paid if order.payment_date.is_none() => patch.payment_date = Some(now),
        OrderStatus::Shipped if order.shipping_date.is_none() => patch.shipping_date = Some(now),
        OrderStatus::Delivered if order.delivery_date.is_none() => patch.delivery_date = Some(now),
        _ => {}
    }

    let updated = state
        .orders
        .update(id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    tracing::info!(order_id = %id, from = %order.status, to = %next, "order status changed");

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "order_status_update",
        "orders",
        json!({ "order_id": id, "from": order.status, "to": next }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        updated,
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if !state.orders.delete(id).await? {
        return Err(AppError::not_found("Order"));
    }

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "order_delete",
        "orders",
        json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order deleted",
        json!({ "id": id }),
        Some(Meta::empty()),
    ))
}
