//! Category endpoints with multilingual name resolution.

use crate::auth::{AdminUser, MaybeUser};
use crate::domain::locale::Lang;
use crate::domain::slug::slugify;
use crate::error::{ApiError, ApiResult};
use crate::models::Category;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Category row plus the display name resolved for the requested language.
#[derive(Debug, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub name: String,
}

impl CategoryView {
    fn resolve(category: Category, lang: Lang) -> Self {
        let name = lang
            .resolve(&category.name_en, &category.name_ar, &category.name_fr)
            .to_string();
        Self { category, name }
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryListQuery {
    pub lang: Option<String>,
    /// Admin-only: include inactive categories.
    pub all: Option<bool>,
}

pub async fn list(
    State(s): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(q): Query<CategoryListQuery>,
) -> ApiResult<Json<Vec<CategoryView>>> {
    let lang = Lang::parse_or_default(q.lang.as_deref());
    let include_inactive =
        q.all.unwrap_or(false) && user.as_ref().is_some_and(|u| u.is_admin());
    let query = if include_inactive {
        "SELECT * FROM categories ORDER BY name_en"
    } else {
        "SELECT * FROM categories WHERE is_active = TRUE ORDER BY name_en"
    };
    let categories = sqlx::query_as::<_, Category>(query).fetch_all(&s.db).await?;
    Ok(Json(categories.into_iter().map(|c| CategoryView::resolve(c, lang)).collect()))
}

pub async fn get_one(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Category>> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("category"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryBody {
    #[validate(length(min = 1, message = "name_en is required"))]
    pub name_en: String,
    #[serde(default)]
    pub name_ar: String,
    #[serde(default)]
    pub name_fr: String,
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

pub async fn create(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Json(body): Json<CategoryBody>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    body.validate()?;
    let slug = slugify(&body.name_en);
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE name_en = $1 OR slug = $2)",
    )
    .bind(&body.name_en)
    .bind(&slug)
    .fetch_one(&s.db)
    .await?;
    if taken {
        return Err(ApiError::Validation("category already exists".into()));
    }

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (id, name_en, name_ar, name_fr, slug, image_url, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&body.name_en)
    .bind(&body.name_ar)
    .bind(&body.name_fr)
    .bind(&slug)
    .bind(&body.image_url)
    .bind(body.is_active)
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CategoryBody>,
) -> ApiResult<Json<Category>> {
    body.validate()?;
    let category = sqlx::query_as::<_, Category>(
        "UPDATE categories SET name_en = $2, name_ar = $3, name_fr = $4, image_url = $5, \
         is_active = $6 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&body.name_en)
    .bind(&body.name_ar)
    .bind(&body.name_fr)
    .bind(&body.image_url)
    .bind(body.is_active)
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound("category"))?;
    Ok(Json(category))
}

/// Hard delete; products in the category fall back to uncategorized
/// (`ON DELETE SET NULL`).
pub async fn remove(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&s.db).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("category"));
    }
    Ok(StatusCode::NO_CONTENT)
}
