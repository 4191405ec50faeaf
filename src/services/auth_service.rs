use serde_json::json;

use crate::{
    audit,
    dto::auth::{
        AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest,
        UserProfile,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, issue_token},
    models::Role,
    repositories::{NewUser, ProfileUpdate},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let RegisterRequest {
        name,
        email,
        password,
        address,
        phone,
    } = payload;

    let user = state
        .users
        .create(NewUser {
            name,
            email,
            password,
            role: Role::Client,
            address,
            phone,
        })
        .await?;
    let token = issue_token(&state.config, &user)?;

    audit::record(
        state.store.as_ref(),
        Some(&user.id),
        "user_register",
        "users",
        json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User created",
        AuthResponse {
            token,
            user: user.into(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let LoginRequest { email, password } = payload;
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation("Email and password are required".into()));
    }

    let user = state
        .users
        .authenticate(&email, &password)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))?;
    let token = issue_token(&state.config, &user)?;

    audit::record(
        state.store.as_ref(),
        Some(&user.id),
        "user_login",
        "users",
        json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        AuthResponse {
            token,
            user: user.into(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn current_user(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<UserProfile>> {
    let record = state
        .users
        .find_by_id(&user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ApiResponse::success("OK", record.into(), Some(Meta::empty())))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    let UpdateProfileRequest {
        name,
        email,
        address,
        phone,
    } = payload;
    let updated = state
        .users
        .update_profile(
            &user.user_id,
            ProfileUpdate {
                name,
                email,
                address,
                phone,
            },
        )
        .await?;

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "profile_update",
        "users",
        json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Profile updated",
        updated.into(),
        Some(Meta::empty()),
    ))
}

pub async fn change_password(
    state: &AppState,
    user: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(AppError::Validation(
            "Current and new password are required".into(),
        ));
    }
    let record = state
        .users
        .find_by_id(&user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    if !state.users.verify_password(&record, &payload.current_password)? {
        return Err(AppError::Validation("Current password is incorrect".into()));
    }
    state
        .users
        .update_password(&user.user_id, &payload.new_password)
        .await?;

    audit::record(
        state.store.as_ref(),
        Some(&user.user_id),
        "password_change",
        "users",
        json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Password updated",
        json!({}),
        Some(Meta::empty()),
    ))
}
