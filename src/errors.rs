use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::cache::CacheError;
use crate::catalog::ScopeError;

/// JSON body of every non-2xx catalog response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Validation error: ram: expected an integer",
    "details": "validation_error",
    "timestamp": "2025-03-01T09:00:00+00:00"
}))]
pub struct ErrorResponse {
    /// Canonical reason phrase of the status code
    #[schema(example = "Bad Request")]
    pub error: String,
    pub message: String,
    /// Machine-readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "validation_error")]
    pub details: Option<String>,
    /// RFC 3339
    pub timestamp: String,
}

impl ErrorResponse {
    fn new(status: StatusCode, message: String, details: Option<String>) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            details,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Failures raised by the catalog services.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    /// Unknown category, item, variant or attribute
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected write input; the message starts with the offending field
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Duplicate code, slug or sku
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<CacheError> for ServiceError {
    fn from(err: CacheError) -> Self {
        ServiceError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<ScopeError> for ServiceError {
    fn from(err: ScopeError) -> Self {
        ServiceError::NotFound(err.to_string())
    }
}

impl ServiceError {
    /// Validation failure attributed to a single input field.
    pub fn invalid_field(field: &str, reason: impl std::fmt::Display) -> Self {
        ServiceError::ValidationError(format!("{field}: {reason}"))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::CacheError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::DatabaseError(_) => "database_error",
            Self::EventError(_)
            | Self::CacheError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "internal_error",
        }
    }

    /// Client-facing message. Server-side failures are reported generically.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_)
            | Self::CacheError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        ApiError::ServiceError(self).into_response()
    }
}

/// Errors returned by the HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        error_code: Option<String>,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::ServiceError(err) => {
                if err.status_code().is_server_error() {
                    tracing::error!(error = %err, "Request failed");
                }
                (
                    err.status_code(),
                    err.response_message(),
                    Some(err.error_code().to_string()),
                )
            }
            ApiError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                msg,
                Some("validation_error".to_string()),
            ),
            ApiError::BadRequest {
                message,
                error_code,
            } => (StatusCode::BAD_REQUEST, message, error_code),
        };

        (status, Json(ErrorResponse::new(status, message, details))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rstest::rstest;

    #[rstest]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found")]
    #[case(ServiceError::invalid_field("ram", "expected an integer"), StatusCode::BAD_REQUEST, "validation_error")]
    #[case(ServiceError::Conflict("x".into()), StatusCode::CONFLICT, "conflict")]
    #[case(ServiceError::CacheError("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "internal_error")]
    #[case(ServiceError::EventError("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "internal_error")]
    fn maps_to_status_and_code(
        #[case] err: ServiceError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn server_side_messages_are_generic() {
        assert_eq!(
            ServiceError::CacheError("lock poisoned".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DatabaseError(sea_orm::DbErr::Custom("boom".into())).response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::invalid_field("ram", "required attribute missing").response_message(),
            "Validation error: ram: required attribute missing"
        );
    }

    #[test]
    fn unknown_scope_is_not_found() {
        let err: ServiceError = ScopeError::UnknownCategory("laptops".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Not found: Category 'laptops' not found");
    }

    #[tokio::test]
    async fn renders_json_body_with_code() {
        let response =
            ApiError::ServiceError(ServiceError::NotFound("Category 'x' not found".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.error, "Not Found");
        assert_eq!(payload.message, "Not found: Category 'x' not found");
        assert_eq!(payload.details.as_deref(), Some("not_found"));
    }
}
