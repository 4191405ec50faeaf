use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::{auth::UserProfile, orders::StatusCount},
    models::{Order, OrderStatus, Product},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthlyStat {
    pub year: i32,
    pub month: u32,
    pub orders: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub total_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_users: u64,
    pub total_products: u64,
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub orders_by_status: Vec<StatusCount>,
    pub monthly_stats: Vec<MonthlyStat>,
    pub recent_orders: Vec<Order>,
    pub top_products: Vec<TopProduct>,
    pub low_stock_products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_users: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub users: Vec<UserProfile>,
    pub pagination: UserPagination,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i64,
}

/// One flattened row per order, ready for CSV conversion on the client.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderExportRow {
    pub order_id: String,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub total: Decimal,
    pub status: OrderStatus,
    pub items_count: usize,
    pub created_at: String,
    pub shipping_city: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderExport {
    pub data: Vec<OrderExportRow>,
    pub count: usize,
}
