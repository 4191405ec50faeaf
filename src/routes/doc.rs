use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{
            Dashboard, InventoryAdjustRequest, MonthlyStat, OrderExport, OrderExportRow,
            TopProduct, UpdateRoleRequest, UserList, UserPagination,
        },
        auth::{
            AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest,
            UpdateProfileRequest, UserProfile,
        },
        favorites::{AddFavoriteRequest, FavoriteProductList, FavoriteStatus},
        orders::{
            AdminOrderList, CheckoutItem, CheckoutResponse, CreateOrderRequest, OrderList,
            OrderSummary, PaymentResult, ProcessPaymentRequest, StatusCount,
            UpdateOrderStatusRequest,
        },
        products::{
            BulkDeleteRequest, BulkResult, BulkUpdateRequest, CatalogPage, CatalogPagination,
            CreateProductRequest, ProductList, UpdateProductRequest,
        },
    },
    models::{
        Color, CustomerInfo, Favorite, Order, OrderItem, OrderStatus, Product, Role,
        ShippingAddress, SizeStock,
    },
    response::{ApiResponse, Meta},
    routes::{admin, auth, favorites, health, orders, payment, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::update_profile,
        auth::change_password,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        payment::create_order,
        payment::process_payment,
        orders::list_orders,
        orders::my_orders,
        orders::get_order,
        orders::cancel_order,
        orders::update_order_status,
        orders::delete_order,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        favorites::check_favorite,
        admin::dashboard,
        admin::list_users,
        admin::update_user_role,
        admin::delete_user,
        admin::bulk_update_products,
        admin::bulk_delete_products,
        admin::export_orders,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            Role,
            Color,
            SizeStock,
            Product,
            OrderStatus,
            CustomerInfo,
            ShippingAddress,
            OrderItem,
            Order,
            Favorite,
            health::HealthData,
            RegisterRequest,
            LoginRequest,
            UserProfile,
            AuthResponse,
            UpdateProfileRequest,
            ChangePasswordRequest,
            CreateProductRequest,
            UpdateProductRequest,
            CatalogPagination,
            CatalogPage,
            ProductList,
            BulkUpdateRequest,
            BulkDeleteRequest,
            BulkResult,
            CheckoutItem,
            CreateOrderRequest,
            OrderSummary,
            CheckoutResponse,
            UpdateOrderStatusRequest,
            ProcessPaymentRequest,
            PaymentResult,
            OrderList,
            StatusCount,
            AdminOrderList,
            AddFavoriteRequest,
            FavoriteProductList,
            FavoriteStatus,
            MonthlyStat,
            TopProduct,
            Dashboard,
            UserPagination,
            UserList,
            UpdateRoleRequest,
            InventoryAdjustRequest,
            OrderExportRow,
            OrderExport,
            Meta,
            ApiResponse<Product>,
            ApiResponse<CatalogPage>,
            ApiResponse<Order>,
            ApiResponse<AuthResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and profile endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Payment", description = "Checkout and payment endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
