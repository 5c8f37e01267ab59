//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("duplicate resource path: {0}")]
    DuplicatePath(String),
    #[error("schema {0} not found in OpenAPI document")]
    MissingSchema(String),
    #[error("schema {name} does not compile: {reason}")]
    InvalidSchema { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    /// Request rejected by a JSON schema or a hook; `details` carries one message per violation.
    #[error("validation: {message}")]
    Validation { message: String, details: Vec<String> },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("hook {hook} failed: {message}")]
    Hook { hook: &'static str, message: String },
}

/// SQLSTATEs raised when a client-supplied value does not fit the column: invalid text
/// representation, datetime format and overflow, numeric out of range, no such operator,
/// no such cast.
const INPUT_SQLSTATES: [&str; 6] = ["22P02", "22007", "22008", "22003", "42883", "42846"];

/// The database message when PostgreSQL rejected a bound value.
fn rejected_input(e: &sqlx::Error) -> Option<&str> {
    match e {
        sqlx::Error::Database(db) => db
            .code()
            .filter(|code| INPUT_SQLSTATES.contains(&&**code))
            .map(|_| db.message()),
        _ => None,
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Db(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(e) if rejected_input(e).is_some() => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Hook { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "hook_rejected"),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        } else {
            tracing::warn!(code, error = %self, "request rejected");
        }
        let details = match &self {
            AppError::Validation { details, .. } if !details.is_empty() => Some(serde_json::json!(details)),
            _ => None,
        };
        // Server-side failures are logged above; the client only sees the code.
        let message = match &self {
            _ if status.is_server_error() => "internal server error".to_string(),
            AppError::Db(e) => match rejected_input(e) {
                Some(reason) => format!("invalid value: {}", reason),
                None => self.to_string(),
            },
            _ => self.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_maps_to_not_found() {
        let (status, code) = AppError::Db(sqlx::Error::RowNotFound).status();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "not_found");
    }

    #[derive(Debug)]
    struct PgFailure {
        code: &'static str,
        message: &'static str,
    }

    impl std::fmt::Display for PgFailure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for PgFailure {}

    impl sqlx::error::DatabaseError for PgFailure {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.code.into())
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

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn pg_error(code: &'static str, message: &'static str) -> AppError {
        AppError::Db(sqlx::Error::Database(Box::new(PgFailure { code, message })))
    }

    async fn body_of(e: AppError) -> (StatusCode, serde_json::Value) {
        let res = e.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn values_postgres_rejects_are_bad_requests() {
        for code in ["22P02", "22007", "22003", "42883"] {
            let (status, name) = pg_error(code, "invalid input syntax for type integer: \"abc\"").status();
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", code);
            assert_eq!(name, "bad_request");
        }
        let (status, body) = body_of(pg_error("22P02", "invalid input syntax for type integer: \"abc\"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"]["message"],
            "invalid value: invalid input syntax for type integer: \"abc\""
        );
    }

    #[tokio::test]
    async fn server_errors_hide_the_database_message() {
        let (status, body) = body_of(pg_error("53300", "too many connections for role \"app\"")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "database_error");
        assert_eq!(body["error"]["message"], "internal server error");
    }

    #[test]
    fn validation_is_a_client_error() {
        let (status, _) = AppError::validation("name is required").status();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
