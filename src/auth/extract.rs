//! Axum extractors for the three auth levels: required, admin-only, optional.

use crate::auth::jwt;
use crate::error::ApiError;
use crate::models::User;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// Any authenticated user.
pub struct CurrentUser(pub User);

/// Authenticated user with the `admin` role.
pub struct AdminUser(pub User);

/// Optional auth: `None` when no `Authorization` header is present. A header
/// that is present but invalid is still a 401, not a silent guest.
pub struct MaybeUser(pub Option<User>);

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn load_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = jwt::verify(token, &state.config.jwt_secret)?;
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::Unauthorized)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(ApiError::Unauthorized)?;
        Ok(Self(load_user(state, token).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(Self(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer(parts) {
            None => Ok(Self(None)),
            Some(token) => Ok(Self(Some(load_user(state, token).await?))),
        }
    }
}
