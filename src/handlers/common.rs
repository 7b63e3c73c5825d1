use crate::errors::{ApiError, ServiceError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input
        .validate()
        .map_err(|e| ApiError::ValidationError(format!("Validation failed: {}", e)))
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// Parses an optional numeric query value; blank values count as absent.
pub fn parse_optional<T: std::str::FromStr>(raw: Option<&str>, field: &str) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(|_| ApiError::BadRequest {
            message: format!("Invalid value for '{}': {}", field, s),
            error_code: Some("invalid_query_parameter".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_optional_treats_blank_as_absent() {
        assert_eq!(parse_optional::<u32>(Some("  "), "level").unwrap(), None);
        assert_eq!(parse_optional::<u32>(Some("2"), "level").unwrap(), Some(2));
        assert_matches!(
            parse_optional::<u32>(Some("two"), "level"),
            Err(ApiError::BadRequest { .. })
        );
    }
}
