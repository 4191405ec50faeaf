use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{Role, User},
    state::AppState,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthRejection {
    #[error("No token provided")]
    MissingCredential,

    #[error("Invalid or expired token")]
    InvalidCredential,

    #[error("User not found")]
    UnknownSubject,
}

impl From<AuthRejection> for AppError {
    fn from(rejection: AuthRejection) -> Self {
        AppError::Unauthorized(rejection.to_string())
    }
}

/// Identity resolved from a bearer token against the live user record.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

pub fn ensure_role(user: &AuthUser, role: Role) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, Role::Admin)
}

pub fn issue_token(config: &AppConfig, user: &User) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.jwt_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.clone(),
        role: user.role,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_token(config: &AppConfig, token: &str) -> Result<Claims, AuthRejection> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthRejection::InvalidCredential)
}

/// `Ok(None)` when no Authorization header is present at all.
fn bearer_token(parts: &Parts) -> Result<Option<String>, AuthRejection> {
    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthRejection::InvalidCredential)?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthRejection::InvalidCredential)?;
    Ok(Some(token.to_string()))
}

/// Verifies the token and loads the user it names. The stored role wins over
/// the role baked into the token.
pub async fn authenticate(state: &AppState, token: &str) -> AppResult<AuthUser> {
    let claims = verify_token(&state.config, token)?;
    let user = state
        .users
        .find_by_id(&claims.sub)
        .await?
        .ok_or(AuthRejection::UnknownSubject)?;
    Ok(AuthUser::from(&user))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or(AuthRejection::MissingCredential)?;
        authenticate(state, &token).await
    }
}

/// Guest-capable routes: no header means guest, a bad header is still 401.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => authenticate(state, &token).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn missing_header_is_guest() {
        assert_eq!(bearer_token(&parts(None)), Ok(None));
    }

    #[test]
    fn non_bearer_scheme_is_invalid() {
        assert_eq!(
            bearer_token(&parts(Some("Basic abc"))),
            Err(AuthRejection::InvalidCredential)
        );
        assert_eq!(
            bearer_token(&parts(Some("Bearer "))),
            Err(AuthRejection::InvalidCredential)
        );
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(
            bearer_token(&parts(Some("Bearer abc.def"))),
            Ok(Some("abc.def".to_string()))
        );
    }

    #[test]
    fn rejections_map_to_unauthorized() {
        let err: AppError = AuthRejection::UnknownSubject.into();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
