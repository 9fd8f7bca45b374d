//! Product catalog and review endpoints.

use crate::auth::{AdminUser, CurrentUser, MaybeUser};
use crate::domain::paging;
use crate::domain::product::mean_rating;
use crate::domain::slug::slugify;
use crate::error::{ApiError, ApiResult, UNIQUE_VIOLATION};
use crate::models::{Paginated, Product, Review};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub keyword: Option<String>,
    pub category: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub featured: Option<bool>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &ProductListQuery, include_inactive: bool) {
    qb.push(" WHERE 1 = 1");
    if !include_inactive {
        qb.push(" AND is_active = TRUE");
    }
    if let Some(keyword) = q.keyword.as_deref().filter(|k| !k.is_empty()) {
        qb.push(" AND name ILIKE ");
        qb.push_bind(format!("%{keyword}%"));
    }
    if let Some(category) = q.category {
        qb.push(" AND category_id = ");
        qb.push_bind(category);
    }
    if let Some(min) = q.min_price {
        qb.push(" AND price >= ");
        qb.push_bind(min);
    }
    if let Some(max) = q.max_price {
        qb.push(" AND price <= ");
        qb.push_bind(max);
    }
    if let Some(featured) = q.featured {
        qb.push(" AND is_featured = ");
        qb.push_bind(featured);
    }
}

/// Sort keys are a fixed whitelist; anything else falls back to newest-first.
fn order_clause(sort: Option<&str>) -> &'static str {
    match sort {
        Some("price") => " ORDER BY price ASC",
        Some("-price") => " ORDER BY price DESC",
        _ => " ORDER BY created_at DESC",
    }
}

pub async fn list(
    State(s): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(q): Query<ProductListQuery>,
) -> ApiResult<Json<Paginated<Product>>> {
    let include_inactive = user.as_ref().is_some_and(|u| u.is_admin());
    let (page, per_page) = paging::window(q.page, q.per_page);

    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
    push_filters(&mut count_qb, &q, include_inactive);
    let total_count: i64 = count_qb.build_query_scalar().fetch_one(&s.db).await?;

    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM products");
    push_filters(&mut qb, &q, include_inactive);
    qb.push(order_clause(q.sort.as_deref()));
    qb.push(" LIMIT ");
    qb.push_bind(per_page);
    qb.push(" OFFSET ");
    qb.push_bind(paging::offset(page, per_page));
    let items = qb.build_query_as::<Product>().fetch_all(&s.db).await?;

    Ok(Json(Paginated { items, page, pages: paging::pages(total_count, per_page), total_count }))
}

pub async fn get_one(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("product"))
}

pub async fn get_by_slug(State(s): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE slug = $1")
        .bind(&slug)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("product"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductBody {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0))]
    pub price: i64,
    pub old_price: Option<i64>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub count_in_stock: i32,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    /// Clearing this hides the product; setting it back re-activates a
    /// soft-deleted one.
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "empty_specs")]
    pub specifications: serde_json::Value,
}

fn empty_specs() -> serde_json::Value {
    serde_json::json!({})
}

fn default_true() -> bool {
    true
}

pub async fn create(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Json(body): Json<ProductBody>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    body.validate()?;
    let slug = body.slug.clone().unwrap_or_else(|| slugify(&body.name));
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE slug = $1)")
        .bind(&slug)
        .fetch_one(&s.db)
        .await?;
    if taken {
        return Err(ApiError::Conflict("product slug"));
    }

    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, name, slug, description, price, old_price, count_in_stock, \
         category_id, images, is_featured, is_active, specifications) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&body.name)
    .bind(&slug)
    .bind(&body.description)
    .bind(body.price)
    .bind(body.old_price)
    .bind(body.count_in_stock)
    .bind(body.category_id)
    .bind(&body.images)
    .bind(body.is_featured)
    .bind(body.is_active)
    .bind(&body.specifications)
    .fetch_one(&s.db)
    .await
    // The pre-check races with concurrent inserts; the unique index is the
    // authority and still reports a 409.
    .map_err(|e| ApiError::on_db_code(e, UNIQUE_VIOLATION, ApiError::Conflict("product slug")))?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ProductBody>,
) -> ApiResult<Json<Product>> {
    body.validate()?;
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET name = $2, slug = COALESCE($3, slug), description = $4, price = $5, \
         old_price = $6, count_in_stock = $7, category_id = $8, images = $9, is_featured = $10, \
         is_active = $11, specifications = $12, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&body.name)
    .bind(&body.slug)
    .bind(&body.description)
    .bind(body.price)
    .bind(body.old_price)
    .bind(body.count_in_stock)
    .bind(body.category_id)
    .bind(&body.images)
    .bind(body.is_featured)
    .bind(body.is_active)
    .bind(&body.specifications)
    .fetch_optional(&s.db)
    .await
    .map_err(|e| ApiError::on_db_code(e, UNIQUE_VIOLATION, ApiError::Conflict("product slug")))?
    .ok_or(ApiError::NotFound("product"))?;
    Ok(Json(product))
}

/// Soft delete: the product disappears from the storefront but order history
/// keeps a valid reference.
pub async fn remove(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&s.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("product"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_reviews(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Review>>> {
    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at DESC",
    )
    .bind(id)
    .fetch_all(&s.db)
    .await?;
    Ok(Json(reviews))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewBody {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

/// One review per user per product; each insert recomputes the product's mean
/// rating inside the same transaction.
pub async fn create_review(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateReviewBody>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    body.validate()?;
    let mut tx = s.db.begin().await?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if !exists {
        return Err(ApiError::NotFound("product"));
    }
    let reviewed: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM reviews WHERE product_id = $1 AND user_id = $2)",
    )
    .bind(id)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;
    if reviewed {
        return Err(ApiError::Validation("product already reviewed".into()));
    }

    let review = sqlx::query_as::<_, Review>(
        "INSERT INTO reviews (id, product_id, user_id, rating, comment) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(id)
    .bind(user.id)
    .bind(body.rating)
    .bind(&body.comment)
    .fetch_one(&mut *tx)
    .await?;

    let (rating_sum, review_count): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(rating), 0)::BIGINT, COUNT(*) FROM reviews WHERE product_id = $1",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("UPDATE products SET rating = $2, num_reviews = $3, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(mean_rating(rating_sum, review_count))
        .bind(review_count as i32)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(review)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_body_defaults() {
        let body: ProductBody = serde_json::from_value(serde_json::json!({
            "name": "Widget",
            "price": 1999
        }))
        .unwrap();
        // A minimal admin payload must not deactivate the product or write a
        // JSON null into the NOT NULL specifications column.
        assert!(body.is_active);
        assert_eq!(body.specifications, serde_json::json!({}));
        assert!(!body.is_featured);
        assert_eq!(body.count_in_stock, 0);
    }

    #[test]
    fn product_body_can_reactivate() {
        let body: ProductBody = serde_json::from_value(serde_json::json!({
            "name": "Widget",
            "price": 1999,
            "is_active": true
        }))
        .unwrap();
        assert!(body.is_active);
        let body: ProductBody = serde_json::from_value(serde_json::json!({
            "name": "Widget",
            "price": 1999,
            "is_active": false
        }))
        .unwrap();
        assert!(!body.is_active);
    }

    #[test]
    fn sort_whitelist() {
        assert_eq!(order_clause(Some("price")), " ORDER BY price ASC");
        assert_eq!(order_clause(Some("-price")), " ORDER BY price DESC");
        assert_eq!(order_clause(Some("rating; DROP TABLE")), " ORDER BY created_at DESC");
        assert_eq!(order_clause(None), " ORDER BY created_at DESC");
    }
}
