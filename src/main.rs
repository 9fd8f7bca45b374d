//! Souq Commerce - storefront and back-office API server.

use anyhow::Result;
use souq_commerce::config::Config;
use souq_commerce::routes;
use souq_commerce::state::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let port = config.port;
    let state = AppState { db, config: Arc::new(config) };
    let app = routes::router(state);

    tracing::info!("souq-commerce listening on 0.0.0.0:{port}");
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?, app).await?;
    Ok(())
}
