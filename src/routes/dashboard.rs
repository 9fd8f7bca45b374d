//! Admin dashboard endpoint.

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::services::stats::{self, Dashboard};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;

pub async fn stats(State(s): State<AppState>, AdminUser(_): AdminUser) -> ApiResult<Json<Dashboard>> {
    Ok(Json(stats::gather(&s.db).await?))
}
