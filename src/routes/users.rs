//! Registration, login, profile, and admin user management.

use crate::auth::{jwt, password, AdminUser, CurrentUser};
use crate::domain::paging;
use crate::error::{ApiError, ApiResult, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};
use crate::models::{Paginated, User};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn auth_response(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let token = jwt::issue(
        user.id,
        &user.role,
        &state.config.jwt_secret,
        state.config.jwt_expires_hours,
    )?;
    Ok(AuthResponse { token, user })
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterBody {
    #[validate(length(min = 2, message = "name is too short"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    pub phone: Option<String>,
}

pub async fn register(
    State(s): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    body.validate()?;
    let email = body.email.trim().to_lowercase();
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&s.db)
        .await?;
    if taken {
        return Err(ApiError::Validation("email already registered".into()));
    }

    let hash = password::hash(&body.password)?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, name, password_hash, role, phone) \
         VALUES ($1, $2, $3, $4, 'user', $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&email)
    .bind(body.name.trim())
    .bind(&hash)
    .bind(&body.phone)
    .fetch_one(&s.db)
    .await
    // Concurrent registrations can slip past the exists-check; the unique
    // index still reports the same 400.
    .map_err(|e| {
        ApiError::on_db_code(e, UNIQUE_VIOLATION, ApiError::Validation("email already registered".into()))
    })?;

    Ok((StatusCode::CREATED, Json(auth_response(&s, user)?)))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(s): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<AuthResponse>> {
    let email = body.email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !password::verify(&body.password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }
    Ok(Json(auth_response(&s, user)?))
}

pub async fn profile(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileBody {
    #[validate(length(min = 2, message = "name is too short"))]
    pub name: Option<String>,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

pub async fn update_profile(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<UpdateProfileBody>,
) -> ApiResult<Json<User>> {
    body.validate()?;
    let hash = body.password.as_deref().map(password::hash).transpose()?;
    let updated = sqlx::query_as::<_, User>(
        "UPDATE users SET name = COALESCE($2, name), password_hash = COALESCE($3, password_hash), \
         phone = COALESCE($4, phone), address = COALESCE($5, address), city = COALESCE($6, city), \
         country = COALESCE($7, country), updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .bind(&body.name)
    .bind(&hash)
    .bind(&body.phone)
    .bind(&body.address)
    .bind(&body.city)
    .bind(&body.country)
    .fetch_one(&s.db)
    .await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Query(q): Query<UserListQuery>,
) -> ApiResult<Json<Paginated<User>>> {
    let (page, per_page) = paging::window(q.page, q.per_page);
    let total_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&s.db).await?;
    let items = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(per_page)
    .bind(paging::offset(page, per_page))
    .fetch_all(&s.db)
    .await?;
    Ok(Json(Paginated { items, page, pages: paging::pages(total_count, per_page), total_count }))
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserBody {
    pub name: Option<String>,
    pub role: Option<String>,
}

pub async fn update(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AdminUpdateUserBody>,
) -> ApiResult<Json<User>> {
    if let Some(role) = body.role.as_deref() {
        if role != "user" && role != "admin" {
            return Err(ApiError::Validation(format!("unknown role: {role}")));
        }
    }
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET name = COALESCE($2, name), role = COALESCE($3, role), \
         updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&body.name)
    .bind(&body.role)
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user))
}

pub async fn remove(
    State(s): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if id == admin.id {
        return Err(ApiError::Validation("cannot delete your own account".into()));
    }
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&s.db)
        .await
        // The user still owns orders.
        .map_err(|e| {
            ApiError::on_db_code(e, FOREIGN_KEY_VIOLATION, ApiError::Validation("user has existing orders".into()))
        })?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("user"));
    }
    Ok(StatusCode::NO_CONTENT)
}
