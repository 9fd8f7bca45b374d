//! Router assembly.

pub mod categories;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod settings;
pub mod uploads;
pub mod users;

use crate::state::AppState;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let upload_dir = state.config.upload_dir.clone();

    Router::new()
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({"status": "healthy", "service": "souq-commerce"})) }),
        )
        .route("/api/users/register", post(users::register))
        .route("/api/users/login", post(users::login))
        .route("/api/users/profile", get(users::profile).put(users::update_profile))
        .route("/api/users", get(users::list))
        .route("/api/users/:id", put(users::update).delete(users::remove))
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/slug/:slug", get(products::get_by_slug))
        .route(
            "/api/products/:id",
            get(products::get_one).put(products::update).delete(products::remove),
        )
        .route(
            "/api/products/:id/reviews",
            get(products::list_reviews).post(products::create_review),
        )
        .route("/api/categories", get(categories::list).post(categories::create))
        .route(
            "/api/categories/:id",
            get(categories::get_one).put(categories::update).delete(categories::remove),
        )
        .route("/api/orders", get(orders::list).post(orders::create))
        .route("/api/orders/mine", get(orders::mine))
        .route("/api/orders/:id", get(orders::get_one))
        .route("/api/orders/:id/print", get(orders::print))
        .route("/api/orders/:id/pay", put(orders::pay))
        .route("/api/orders/:id/unpay", put(orders::unpay))
        .route("/api/orders/:id/deliver", put(orders::deliver))
        .route("/api/orders/:id/status", put(orders::set_status))
        .route("/api/admin/dashboard", get(dashboard::stats))
        .route("/api/settings", get(settings::get_settings).put(settings::update_settings))
        .route("/api/upload/:folder", post(uploads::upload))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
