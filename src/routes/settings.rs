//! Site settings: a singleton JSON blob, public read, admin write.

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;

pub async fn get_settings(State(s): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let data: serde_json::Value =
        sqlx::query_scalar("SELECT data FROM settings WHERE id = 1").fetch_one(&s.db).await?;
    Ok(Json(data))
}

pub async fn update_settings(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Json(data): Json<serde_json::Value>,
) -> ApiResult<Json<serde_json::Value>> {
    let data: serde_json::Value = sqlx::query_scalar(
        "UPDATE settings SET data = $1, updated_at = NOW() WHERE id = 1 RETURNING data",
    )
    .bind(data)
    .fetch_one(&s.db)
    .await?;
    Ok(Json(data))
}
