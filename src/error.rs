//! API error type.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl is the
//! single place errors are formatted, as a `{"message": ...}` JSON body with
//! the mapped status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid quantity")]
    InvalidQuantity,

    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("guest checkout requires a name and phone number")]
    MissingGuestInfo,

    #[error("order is already paid")]
    AlreadyPaid,

    #[error("order is not paid")]
    NotPaid,

    #[error("{0}")]
    Validation(String),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("missing or invalid token")]
    Unauthorized,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("not allowed")]
    Forbidden,

    #[error("database error")]
    Db(#[from] sqlx::Error),

    #[error("i/o error")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Postgres error code for unique-constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";
/// Postgres error code for foreign-key violations.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

impl ApiError {
    /// Replace a database error carrying `code` with `instead`; every other
    /// database error stays a 500. Lets check-then-insert paths surface
    /// constraint races as the same client error as the pre-check.
    pub fn on_db_code(e: sqlx::Error, code: &str, instead: ApiError) -> ApiError {
        match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(code) => instead,
            _ => ApiError::Db(e),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidQuantity
            | Self::InsufficientStock(_)
            | Self::MissingGuestInfo
            | Self::AlreadyPaid
            | Self::NotPaid
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Db(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[derive(Debug)]
    struct FakeDbError(&'static str);

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "constraint violation ({})", self.0)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "constraint violation"
        }
        fn code(&self) -> Option<Cow<'_, str>> {
            Some(self.0.into())
        }
        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }
        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }
        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    fn db_err(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError(code)))
    }

    #[test]
    fn unique_violation_becomes_conflict() {
        let e = ApiError::on_db_code(
            db_err(UNIQUE_VIOLATION),
            UNIQUE_VIOLATION,
            ApiError::Conflict("product slug"),
        );
        assert!(matches!(e, ApiError::Conflict("product slug")));
        assert_eq!(e.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn foreign_key_violation_becomes_validation() {
        let e = ApiError::on_db_code(
            db_err(FOREIGN_KEY_VIOLATION),
            FOREIGN_KEY_VIOLATION,
            ApiError::Validation("user has existing orders".into()),
        );
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_db_errors_stay_internal() {
        let e = ApiError::on_db_code(db_err("42703"), UNIQUE_VIOLATION, ApiError::Conflict("product slug"));
        assert!(matches!(e, ApiError::Db(_)));
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn statuses_map_to_http_codes() {
        assert_eq!(ApiError::NotFound("order").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::InsufficientStock("Widget".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("slug").status(), StatusCode::CONFLICT);
    }
}
