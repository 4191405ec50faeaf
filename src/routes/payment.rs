use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::{
    dto::orders::{CheckoutResponse, CreateOrderRequest, PaymentResult, ProcessPaymentRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/process-payment", post(process_payment))
}

#[utoipa::path(
    post,
    path = "/api/payment/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Empty cart, missing customer data or insufficient stock"),
        (status = 404, description = "Product not found"),
    ),
    tag = "Payment"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CheckoutResponse>>)> {
    let resp = order_service::checkout(&state, user.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/payment/process-payment",
    request_body = ProcessPaymentRequest,
    responses(
        (status = 200, description = "Payment approved", body = ApiResponse<PaymentResult>),
        (status = 400, description = "Payment declined or order not pending"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProcessPaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentResult>>> {
    let resp = order_service::process_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}
