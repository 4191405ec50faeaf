use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use crate::{
    audit,
    dto::{
        admin::{
            Dashboard, InventoryAdjustRequest, MonthlyStat, OrderExport, OrderExportRow,
            TopProduct, UpdateRoleRequest, UserList, UserPagination,
        },
        auth::UserProfile,
        products::{BulkDeleteRequest, BulkResult, BulkUpdateRequest, ProductList},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderStatus, Product, Role},
    response::{ApiResponse, Meta},
    routes::params::{ExportQuery, LowStockQuery, Pagination, UserListQuery, parse_param},
    services::order_service::status_counts,
    state::AppState,
};

const RECENT_ORDERS: usize = 10;
const TOP_PRODUCTS: usize = 5;
const LOW_STOCK_LIMIT: usize = 10;
const MONTHS_SHOWN: usize = 12;
const USERS_PAGE_SIZE: u64 = 20;

pub fn revenue(orders: &[Order]) -> Decimal {
    orders
        .iter()
        .filter(|o| o.status.counts_as_revenue())
        .fold(Decimal::ZERO, |sum, o| sum.saturating_add(o.total))
}

/// Orders and revenue per calendar month, most recent month first.
pub fn monthly_stats(orders: &[Order]) -> Vec<MonthlyStat> {
    let mut months: BTreeMap<(i32, u32), (u64, Decimal)> = BTreeMap::new();
    for order in orders {
        let entry = months
            .entry((order.created_at.year(), order.created_at.month()))
            .or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 = entry.1.saturating_add(order.total);
    }
    months
        .into_iter()
        .rev()
        .take(MONTHS_SHOWN)
        .map(|((year, month), (orders, revenue))| MonthlyStat {
            year,
            month,
            orders,
            revenue,
        })
        .collect()
}

/// Best sellers by units across non-cancelled orders; ties keep first-sold order.
pub fn top_products(orders: &[Order]) -> Vec<TopProduct> {
    let mut totals: Vec<TopProduct> = Vec::new();
    for order in orders.iter().filter(|o| o.status != OrderStatus::Cancelled) {
        for item in &order.items {
            match totals.iter_mut().find(|t| t.product_id == item.product) {
                Some(total) => {
                    total.total_sold = total.total_sold.saturating_add(item.quantity);
                    total.revenue = total.revenue.saturating_add(item.line_total());
                }
                None => totals.push(TopProduct {
                    product_id: item.product.clone(),
                    name: item.name.clone(),
                    total_sold: item.quantity,
                    revenue: item.line_total(),
                }),
            }
        }
    }
    totals.sort_by(|a, b| b.total_sold.cmp(&a.total_sold));
    totals.truncate(TOP_PRODUCTS);
    totals
}

/// Live products at or below `threshold`, lowest stock first.
pub fn low_stock(products: Vec<Product>, threshold: i64) -> Vec<Product> {
    let mut low: Vec<Product> = products
        .into_iter()
        .filter(|p| p.stock <= threshold)
        .collect();
    low.sort_by_key(|p| p.stock);
    low
}

pub async fn dashboard(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Dashboard>> {
    ensure_admin(user)?;
    let orders = state.orders.list_all().await?;
    let products = state.products.list_active().await?;

    let mut recent = orders.clone();
    recent.reverse();
    recent.truncate(RECENT_ORDERS);

    let mut low = low_stock(products.clone(), state.config.low_stock_threshold);
    low.truncate(LOW_STOCK_LIMIT);

    let data = Dashboard {
        total_users: state.users.count_by_role(Role::Client).await?,
        total_products: products.len() as u64,
        total_orders: orders.len() as u64,
        total_revenue: revenue(&orders),
        orders_by_status: status_counts(&orders),
        monthly_stats: monthly_stats(&orders),
        recent_orders: recent,
        top_products: top_products(&orders),
        low_stock_products: low,
    };
    Ok(ApiResponse::success("Dashboard", data, Some(Meta::empty())))
}

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let pagination = Pagination::parse(query.page.as_deref(), query.limit.as_deref(), USERS_PAGE_SIZE)?;
    let role = match query.role.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<Role>().map_err(AppError::Validation)?),
    };

    let users = state.users.list(query.search.as_deref(), role).await?;
    let total = users.len() as u64;
    let users: Vec<UserProfile> = pagination
        .slice(users)
        .into_iter()
        .map(UserProfile::from)
        .collect();

    let data = UserList {
        users,
        pagination: UserPagination {
            current_page: pagination.page,
            total_pages: pagination.total_pages(total),
            total_users: total,
        },
    };
    let meta = Meta::new(pagination.page, pagination.limit, total);
    Ok(ApiResponse::success("Users", data, Some(meta)))
}

pub async fn update_user_role(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    ensure_admin(user)?;
    let role: Role = payload
        .role
        .trim()
        .parse()
        .map_err(|_| AppError::Validation("Invalid role".into()))?;
    let updated = state.users.set_role(id, role).await?;

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "user_role_update",
        "users",
        json!({ "user_id": id, "role": role }),
    )
    .await;

    Ok(ApiResponse::success(
        "Role updated",
        updated.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if id == user.user_id {
        return Err(AppError::Validation("You cannot delete your own account".into()));
    }
    if !state.users.soft_delete(id).await? {
        return Err(AppError::not_found("User"));
    }

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "user_delete",
        "users",
        json!({ "user_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User deleted",
        json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn bulk_update_products(
    state: &AppState,
    user: &AuthUser,
    payload: BulkUpdateRequest,
) -> AppResult<ApiResponse<BulkResult>> {
    ensure_admin(user)?;
    if payload.product_ids.is_empty() {
        return Err(AppError::Validation("No products selected".into()));
    }

    let mut modified_count = 0;
    for id in &payload.product_ids {
        if state.products.update(id, payload.updates.clone().into()).await?.is_some() {
            modified_count += 1;
        }
    }

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "product_bulk_update",
        "products",
        json!({ "product_ids": payload.product_ids, "modified": modified_count }),
    )
    .await;

    Ok(ApiResponse::success(
        format!("{modified_count} products updated"),
        BulkResult { modified_count },
        Some(Meta::empty()),
    ))
}

pub async fn bulk_delete_products(
    state: &AppState,
    user: &AuthUser,
    payload: BulkDeleteRequest,
) -> AppResult<ApiResponse<BulkResult>> {
    ensure_admin(user)?;
    if payload.product_ids.is_empty() {
        return Err(AppError::Validation("No products selected".into()));
    }

    let mut modified_count = 0;
    for id in &payload.product_ids {
        if state.products.soft_delete(id).await? {
            modified_count += 1;
        }
    }

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "product_bulk_delete",
        "products",
        json!({ "product_ids": payload.product_ids, "deleted": modified_count }),
    )
    .await;

    Ok(ApiResponse::success(
        format!("{modified_count} products deleted"),
        BulkResult { modified_count },
        Some(Meta::empty()),
    ))
}

/// Accepts an RFC 3339 timestamp or a bare date. A bare end date covers the
/// whole day.
fn parse_bound(name: &str, raw: Option<&str>, end_of_day: bool) -> AppResult<Option<DateTime<Utc>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid value for `{name}`: {raw}")))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    Ok(time.map(|t| t.and_utc()))
}

pub async fn export_orders(
    state: &AppState,
    user: &AuthUser,
    query: ExportQuery,
) -> AppResult<ApiResponse<OrderExport>> {
    ensure_admin(user)?;
    let start = parse_bound("startDate", query.start_date.as_deref(), false)?;
    let end = parse_bound("endDate", query.end_date.as_deref(), true)?;

    let mut orders = state.orders.list_all().await?;
    orders.reverse();

    let mut rows = Vec::new();
    for order in orders {
        if start.is_some_and(|start| order.created_at < start)
            || end.is_some_and(|end| order.created_at > end)
        {
            continue;
        }
        let account = match &order.user {
            Some(user_id) => state.users.find_by_id(user_id).await?,
            None => None,
        };
        let (customer_name, customer_email) = match account {
            Some(account) => (account.name, account.email),
            None => (
                order.customer_info.name.clone(),
                order.customer_info.email.clone(),
            ),
        };
        let shipping_city = match order.shipping_address.city.trim() {
            "" => "N/A".to_string(),
            city => city.to_string(),
        };
        rows.push(OrderExportRow {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            customer_name,
            customer_email,
            total: order.total,
            status: order.status,
            items_count: order.items.len(),
            created_at: order.created_at.to_rfc3339(),
            shipping_city,
        });
    }

    let count = rows.len();
    Ok(ApiResponse::success(
        "Orders export",
        OrderExport { data: rows, count },
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = parse_param::<i64>("threshold", query.threshold.as_deref())?
        .unwrap_or(state.config.low_stock_threshold);
    let items = low_stock(state.products.list_active().await?, threshold);
    let total = items.len() as u64;
    Ok(ApiResponse::success(
        "Low stock products",
        ProductList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let product = state.products.adjust_stock(id, payload.delta).await?;

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "inventory_adjust",
        "products",
        json!({ "product_id": id, "delta": payload.delta, "stock": product.stock }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory adjusted",
        product,
        Some(Meta::empty()),
    ))
}
