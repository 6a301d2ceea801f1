use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::admin::AdminError;
use crate::application::auth::AdminAuthError;
use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use crate::cache::{CacheError, CachedBuildError};

use super::public::BuildError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const VALIDATION: &str = "validation_error";
    pub const UNKNOWN_REFERENCE: &str = "unknown_reference";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const CACHE: &str = "cache_error";
    pub const ENCODE: &str = "encode_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized(message: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, message, None)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Duplicate record",
                Some(constraint),
            ),
            RepoError::NotFound => ApiError::not_found("resource not found"),
            RepoError::InvalidInput { message } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message),
            ),
            RepoError::Integrity { message } => ApiError::new(
                StatusCode::CONFLICT,
                codes::INTEGRITY,
                "Integrity constraint violated",
                Some(message),
            ),
            RepoError::Timeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            RepoError::Persistence(msg) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                Some(msg),
            ),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::CACHE,
            "Cache store unavailable",
            Some(err.to_string()),
        )
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Validation { field, message } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::VALIDATION,
                "Validation failed",
                Some(format!("{field}: {message}")),
            ),
            AdminError::NotFound { entity } => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(format!("{entity} not found")),
            ),
            AdminError::Duplicate { field } => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Duplicate record",
                Some(field.to_string()),
            ),
            AdminError::UnknownReference { field, id } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::UNKNOWN_REFERENCE,
                "Unknown reference",
                Some(format!("{field}: {id}")),
            ),
            AdminError::Repo(repo) => repo.into(),
            AdminError::Cache(cache) => cache.into(),
        }
    }
}

impl From<AdminAuthError> for ApiError {
    fn from(err: AdminAuthError) -> Self {
        match err {
            AdminAuthError::Missing => ApiError::unauthorized("Admin token required"),
            AdminAuthError::Invalid => ApiError::unauthorized("Admin token rejected"),
        }
    }
}

impl From<CachedBuildError<BuildError>> for ApiError {
    fn from(err: CachedBuildError<BuildError>) -> Self {
        match err {
            CachedBuildError::Cache(cache) => cache.into(),
            CachedBuildError::Build(BuildError::Repo(repo)) => repo.into(),
            CachedBuildError::Build(BuildError::Encode(encode)) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::ENCODE,
                "Response could not be encoded",
                Some(encode.to_string()),
            ),
        }
    }
}
