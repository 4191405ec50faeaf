mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use storefront_api::{models::Role, routes::create_app};
use tower::ServiceExt;

use common::{create_product, create_user, memory_state};

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

#[tokio::test]
async fn register_login_and_profile() {
    let app = create_app(memory_state());

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "name": "Alex", "email": "Alex@Example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["email"], "alex@example.com");
    assert_eq!(body["data"]["user"]["role"], "client");
    assert!(body["data"]["user"].get("password").is_none());

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "name": "Alex", "email": "alex@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "alex@example.com", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "alex@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().expect("token").to_string();

    let (status, body) = send(&app, get("/api/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Alex");
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let app = create_app(memory_state());

    let (status, body) = send(&app, get("/api/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");

    let (status, body) = send(&app, get("/api/favorites", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let state = memory_state();
    let client = create_user(&state, "client@example.com", Role::Client)
        .await
        .expect("client");
    let admin = create_user(&state, "admin@example.com", Role::Admin)
        .await
        .expect("admin");
    let config = state.config.clone();
    let app = create_app(state.clone());

    let client_user = state
        .users
        .find_by_id(&client.user_id)
        .await
        .expect("lookup")
        .expect("client user");
    let client_token =
        storefront_api::middleware::auth::issue_token(&config, &client_user).expect("token");
    let (status, _) = send(&app, get("/api/admin/dashboard", Some(&client_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_user = state
        .users
        .find_by_id(&admin.user_id)
        .await
        .expect("lookup")
        .expect("admin user");
    let admin_token =
        storefront_api::middleware::auth::issue_token(&config, &admin_user).expect("token");
    let (status, body) = send(&app, get("/api/admin/dashboard", Some(&admin_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalUsers"], 1);
}

#[tokio::test]
async fn catalog_is_public_and_validates_query() {
    let state = memory_state();
    create_product(&state, "Shirt", 25, 2).await.expect("shirt");
    create_product(&state, "Scarf", 15, 9).await.expect("scarf");
    let app = create_app(state);

    let (status, body) = send(&app, get("/api/products?sort=price_asc", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["products"][0]["name"], "Scarf");
    assert_eq!(body["data"]["pagination"]["totalProducts"], 2);

    let (status, body) = send(
        &app,
        get("/api/products?page=4611686018427387905&limit=4", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["products"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["data"]["pagination"]["totalProducts"], 2);

    let (status, _) = send(&app, get("/api/products?page=abc", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/api/products/unknown", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn guest_checkout_over_http() {
    let state = memory_state();
    let shirt = create_product(&state, "Shirt", 25, 2).await.expect("shirt");
    let app = create_app(state);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/payment/create-order",
            None,
            json!({
                "items": [{ "productId": shirt.id, "quantity": 3 }],
                "customerInfo": { "name": "Sam", "email": "sam@example.com" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Insufficient stock for Shirt. Available: 2");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/payment/create-order",
            None,
            json!({
                "items": [{ "productId": shirt.id, "quantity": 2 }],
                "customerInfo": { "name": "Sam", "email": "sam@example.com" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order"]["status"], "pending");
}

#[tokio::test]
async fn unknown_paths_fall_back_to_not_found() {
    let app = create_app(memory_state());

    let (status, body) = send(&app, get("/api/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["path"], "/api/nope");

    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["storage"], "memory");
}
