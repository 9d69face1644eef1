//! Error taxonomy.
//!
//! Each component returns its own `thiserror` enum; [`AppError`] is the only
//! type that knows about HTTP and is converted into a response at the router
//! boundary.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("username is already taken")]
    UsernameTaken,
    #[error("email is already registered")]
    EmailTaken,
    #[error("{0}")]
    Validation(String),
    #[error("credential not found")]
    NotFound,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("email address no longer matches the account")]
    EmailMismatch,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token was issued for a different purpose")]
    WrongPurpose,
    #[error("token has already been used")]
    AlreadyUsed,
    #[error("token was issued for a different email address")]
    Superseded,
    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum HydraError {
    #[error("authorization server unreachable: {0}")]
    Transport(String),
    #[error("authorization server answered HTTP {status}: {context}")]
    Status { status: u16, context: String },
    #[error("unexpected authorization server response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("failed to render template: {0}")]
    Render(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Request-level error carrying the status it maps to.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("email address has not been confirmed")]
    EmailNotValidated,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("token not valid")]
    InvalidToken(TokenError),
    #[error(transparent)]
    Upstream(#[from] HydraError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::UsernameTaken | CredentialError::EmailTaken => {
                AppError::Conflict(err.to_string())
            }
            CredentialError::Validation(msg) => AppError::Validation(msg),
            CredentialError::NotFound | CredentialError::IncorrectPassword => {
                AppError::InvalidCredentials
            }
            CredentialError::EmailMismatch => AppError::InvalidToken(TokenError::Superseded),
            CredentialError::Hashing(msg) => AppError::Internal(msg),
            CredentialError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AppError::Internal(msg),
            other => AppError::InvalidToken(other),
        }
    }
}

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Stable error code (e.g. `validation_failed`, `invalid_token`).
    pub error: String,
    /// Human-readable description, safe to show to the end user.
    pub error_description: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::EmailNotValidated => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_failed",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::EmailNotValidated => "email_not_validated",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Upstream(_) => "upstream_error",
            AppError::Internal(_) => "server_error",
        }
    }

    /// Message exposed to the caller. Server-side failures stay opaque.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Upstream(_) => "the authorization server could not process the request".into(),
            AppError::Internal(_) => "an internal error occurred".into(),
            AppError::EmailNotValidated => {
                "email address has not been confirmed; a new confirmation email has been sent"
                    .into()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upstream(e) => tracing::error!(
                name = "http.error.upstream",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                message = "Authorization server call failed"
            ),
            AppError::Internal(e) => tracing::error!(
                name = "http.error.internal",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                message = "Request failed with an internal error"
            ),
            AppError::InvalidToken(kind) => tracing::debug!(
                name = "http.error.token",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                kind = %kind,
                message = "Rejected action token"
            ),
            _ => {}
        }

        let body = ErrorBody {
            error: self.code().to_string(),
            error_description: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
