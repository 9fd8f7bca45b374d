//! Order endpoints. Business rules live in `services::orders`; this layer
//! handles auth and ownership.

use crate::auth::{AdminUser, CurrentUser, MaybeUser};
use crate::domain::order::OrderStatus;
use crate::error::{ApiError, ApiResult};
use crate::models::{Order, OrderWithItems, Paginated};
use crate::services::orders as svc;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

pub async fn create(
    State(s): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(input): Json<svc::CreateOrderInput>,
) -> ApiResult<(StatusCode, Json<OrderWithItems>)> {
    let order = svc::create_order(&s.db, user.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_one(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderWithItems>> {
    let order = svc::get_order(&s.db, id).await?;
    if !user.is_admin() && order.order.user_id != user.id {
        return Err(ApiError::Forbidden);
    }
    Ok(Json(order))
}

/// Unauthenticated read used by the print view.
pub async fn print(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<OrderWithItems>> {
    Ok(Json(svc::get_order(&s.db, id).await?))
}

pub async fn mine(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(svc::list_for_user(&s.db, user.id).await?))
}

pub async fn pay(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    payment_result: Option<Json<serde_json::Value>>,
) -> ApiResult<Json<OrderWithItems>> {
    let existing = svc::get_order(&s.db, id).await?;
    if !user.is_admin() && existing.order.user_id != user.id {
        return Err(ApiError::Forbidden);
    }
    let order = svc::mark_paid(&s.db, id, payment_result.map(|Json(v)| v)).await?;
    Ok(Json(order))
}

pub async fn unpay(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderWithItems>> {
    Ok(Json(svc::mark_unpaid(&s.db, id).await?))
}

pub async fn deliver(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    Ok(Json(svc::set_status(&s.db, id, OrderStatus::Delivered).await?))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusBody {
    pub status: String,
}

pub async fn set_status(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SetStatusBody>,
) -> ApiResult<Json<Order>> {
    let status: OrderStatus = body
        .status
        .parse()
        .map_err(|_| ApiError::Validation(format!("unknown status: {}", body.status)))?;
    Ok(Json(svc::set_status(&s.db, id, status).await?))
}

pub async fn list(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<svc::OrderListQuery>,
) -> ApiResult<Json<Paginated<Order>>> {
    Ok(Json(svc::list_orders(&s.db, query).await?))
}
