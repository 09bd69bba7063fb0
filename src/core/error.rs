use axum::BoxError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Duration;

use crate::types::response::{ErrorResponse, ValidationErrorResponse};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Database migration error: {0}")]
    DatabaseMigration(#[from] sqlx::migrate::MigrateError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("Cache operation timed out")]
    Timeout,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct FieldError {
    pub(crate) field: String,
    pub(crate) error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Token signing failed: {0}")]
    SigningFailure(#[from] jsonwebtoken::errors::Error),
    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Expired token")]
    ExpiredToken,
    #[error("No credentials provided")]
    MissingCredentials,
    #[error("Malformed credentials")]
    MalformedCredentials,
    #[error("Identity not found")]
    IdentityNotFound,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account inactive")]
    AccountInactive,
    #[error("Forbidden")]
    Forbidden,
    #[error("Rate limited for {0:?}")]
    RateLimited(Duration),
    #[error("Not found")]
    NotFound,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("Email address already in use")]
    DuplicateEmail,
    #[error("Username already in use")]
    DuplicateUsername,
    #[error("{0} unavailable")]
    DependencyUnavailable(&'static str),
    #[error("Internal server error")]
    Internal,
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(_: PathRejection) -> Self {
        Error::BadRequest("invalid id parameter".to_owned())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

/// Whole seconds, rounded up so clients never retry early.
pub(crate) fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // every way of failing authentication looks the same from the outside,
            // including in the logs
            Error::InvalidToken | Error::IdentityNotFound => {
                tracing::info!("Request rejected: unauthenticated");
                (StatusCode::UNAUTHORIZED, "invalid authentication token".to_owned())
            }
            Error::ExpiredToken => {
                tracing::info!("Request rejected: unauthenticated");
                (StatusCode::UNAUTHORIZED, "token has expired".to_owned())
            }
            Error::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "authorization header is required".to_owned(),
            ),
            Error::MalformedCredentials => (
                StatusCode::UNAUTHORIZED,
                "authorization header format must be Bearer {token}".to_owned(),
            ),
            Error::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "You must be authenticated to access this resource".to_owned(),
            ),
            Error::AccountInactive => {
                tracing::info!("Request rejected: inactive account");
                (StatusCode::FORBIDDEN, "user account is inactive".to_owned())
            }
            Error::Forbidden => (
                StatusCode::FORBIDDEN,
                "You don't have permission to access this resource".to_owned(),
            ),
            Error::RateLimited(retry_after) => {
                let secs = retry_after_secs(*retry_after);
                let body = ErrorResponse::new(&format!(
                    "Rate limit exceeded. Try again in {} seconds",
                    secs
                ));

                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));

                return response;
            }
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                "The requested resource could not be found".to_owned(),
            ),
            Error::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            Error::Validation(errors) => {
                tracing::debug!("Validation error: {:?}", errors);
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ValidationErrorResponse::new(errors.clone())),
                )
                    .into_response();
            }
            Error::DuplicateEmail | Error::DuplicateUsername => {
                (StatusCode::CONFLICT, self.to_string())
            }
            Error::DependencyUnavailable(_) => {
                tracing::error!("{:?}", self);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "The service is temporarily unavailable".to_owned(),
                )
            }
            Error::Sql(_)
            | Error::SigningFailure(_)
            | Error::Bcrypt(_)
            | Error::Internal => {
                tracing::error!("{:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The server encountered a problem and could not process your request"
                        .to_owned(),
                )
            }
        };

        (status, Json(ErrorResponse::new(&message))).into_response()
    }
}

pub(crate) async fn handle_middleware_errors(err: BoxError) -> (StatusCode, Json<ErrorResponse>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        return (
            StatusCode::REQUEST_TIMEOUT,
            Json(ErrorResponse::new("request timed out")),
        );
    }

    tracing::error!("Unhandled error: {:?}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal Server Error")),
    )
}
