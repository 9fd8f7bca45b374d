//! Environment configuration.

use anyhow::Context;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expires_hours: i64,
    pub upload_dir: PathBuf,
    pub port: u16,
}

impl Config {
    /// Collect configuration from the environment. `DATABASE_URL` and
    /// `JWT_SECRET` are mandatory; secrets are never defaulted in code.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let jwt_expires_hours = std::env::var("JWT_EXPIRES_HOURS")
            .ok()
            .map(|v| v.parse::<i64>())
            .transpose()
            .context("JWT_EXPIRES_HOURS must be an integer")?
            .unwrap_or(72);
        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let port = std::env::var("PORT")
            .ok()
            .map(|v| v.parse::<u16>())
            .transpose()
            .context("PORT must be a number")?
            .unwrap_or(8080);

        Ok(Self { database_url, jwt_secret, jwt_expires_hours, upload_dir, port })
    }
}
