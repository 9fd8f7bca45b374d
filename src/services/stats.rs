//! Dashboard aggregates.
//!
//! Everything is recomputed per request with plain aggregates over the live
//! tables. No caching and no materialized counters; acceptable at the data
//! volumes this back office serves.

use crate::domain::product::LOW_STOCK_THRESHOLD;
use crate::error::ApiResult;
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub total_products: i64,
    pub total_orders: i64,
    pub total_users: i64,
    pub total_categories: i64,
    /// Sum of `total_price` over paid orders, all time.
    pub revenue: i64,
    pub out_of_stock: i64,
    pub low_stock: i64,
    /// Trailing 30 days vs the 30 days before, percent.
    pub revenue_change_pct: f64,
    pub orders_change_pct: f64,
}

pub async fn gather(pool: &PgPool) -> ApiResult<Dashboard> {
    let total_products: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;
    let total_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(pool).await?;
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await?;
    let total_categories: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;

    let revenue: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_price), 0)::BIGINT FROM orders WHERE is_paid = TRUE",
    )
    .fetch_one(pool)
    .await?;

    let out_of_stock: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = TRUE AND count_in_stock = 0")
            .fetch_one(pool)
            .await?;
    let low_stock: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products WHERE is_active = TRUE AND count_in_stock > 0 AND count_in_stock <= $1",
    )
    .bind(LOW_STOCK_THRESHOLD)
    .fetch_one(pool)
    .await?;

    let now = Utc::now();
    let current_start = now - Duration::days(30);
    let previous_start = now - Duration::days(60);

    let (current_revenue,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_price), 0)::BIGINT FROM orders WHERE is_paid = TRUE AND created_at >= $1",
    )
    .bind(current_start)
    .fetch_one(pool)
    .await?;
    let (previous_revenue,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_price), 0)::BIGINT FROM orders \
         WHERE is_paid = TRUE AND created_at >= $1 AND created_at < $2",
    )
    .bind(previous_start)
    .bind(current_start)
    .fetch_one(pool)
    .await?;

    let current_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE created_at >= $1")
            .bind(current_start)
            .fetch_one(pool)
            .await?;
    let previous_orders: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM orders WHERE created_at >= $1 AND created_at < $2",
    )
    .bind(previous_start)
    .bind(current_start)
    .fetch_one(pool)
    .await?;

    Ok(Dashboard {
        total_products,
        total_orders,
        total_users,
        total_categories,
        revenue,
        out_of_stock,
        low_stock,
        revenue_change_pct: pct_change(current_revenue, previous_revenue),
        orders_change_pct: pct_change(current_orders, previous_orders),
    })
}

/// Period-over-period change in percent. An empty prior window reports 100%
/// when there is current activity, otherwise 0%.
fn pct_change(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        if current == 0 {
            0.0
        } else {
            100.0
        }
    } else {
        (current - previous) as f64 * 100.0 / previous as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_change_basics() {
        assert_eq!(pct_change(150, 100), 50.0);
        assert_eq!(pct_change(50, 100), -50.0);
        assert_eq!(pct_change(100, 100), 0.0);
    }

    #[test]
    fn empty_prior_window() {
        assert_eq!(pct_change(0, 0), 0.0);
        assert_eq!(pct_change(42, 0), 100.0);
    }

    #[tokio::test]
    #[ignore = "needs a live Postgres via DATABASE_URL"]
    async fn revenue_equals_sum_over_paid_orders() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for these tests");
        let pool = PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");

        let user_id = uuid::Uuid::now_v7();
        sqlx::query("INSERT INTO users (id, email, name, password_hash) VALUES ($1, $2, 'Stats Tester', 'x')")
            .bind(user_id)
            .bind(format!("stats-{}@test.com", uuid::Uuid::new_v4()))
            .execute(&pool)
            .await
            .unwrap();
        // One paid order that must count, one unpaid that must not.
        for (total, paid) in [(5000_i64, true), (700_i64, false)] {
            sqlx::query(
                "INSERT INTO orders (id, user_id, shipping_address, items_price, shipping_price, \
                 tax_price, total_price, is_paid, paid_at) \
                 VALUES ($1, $2, '{}', $3, 0, 0, $3, $4, CASE WHEN $4 THEN NOW() END)",
            )
            .bind(uuid::Uuid::now_v7())
            .bind(user_id)
            .bind(total)
            .bind(paid)
            .execute(&pool)
            .await
            .unwrap();
        }

        let expected: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_price), 0)::BIGINT FROM orders WHERE is_paid = TRUE",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        let dashboard = gather(&pool).await.unwrap();
        assert_eq!(dashboard.revenue, expected);
        assert!(dashboard.revenue >= 5000);
    }
}
