// Error handling module for the storefront engine
// Maps module errors onto HTTP responses with a consistent JSON body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::import::ImportError;
use crate::loyalty::LoyaltyError;
use crate::promotions::PromotionError;

/// Main error type for the API
/// All handlers return Result<T, ApiError>
#[derive(Debug)]
pub enum ApiError {
    /// Request failed field validation
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Request is well-formed JSON but its content is unusable
    /// Maps to HTTP 400 Bad Request
    BadRequest(String),

    /// Resource not found by ID
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Duplicate resource conflict
    /// Maps to HTTP 409 Conflict
    Conflict { message: String },

    /// Request is valid but a loyalty or promotion rule refuses it
    /// Maps to HTTP 422 Unprocessable Entity
    BusinessRule(String),

    /// Database operation errors
    /// Maps to HTTP 500, details stay in the logs
    DatabaseError(sqlx::Error),

    /// Internal server errors
    /// Maps to HTTP 500, details stay in the logs
    InternalError(String),
}

/// JSON body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "VALIDATION_ERROR", "NOT_FOUND")
    pub error_code: String,

    pub message: String,

    /// Field-level validation errors, omitted when None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// RFC 3339 timestamp of when the error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    fn new(error_code: &str, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.to_string(),
            message: message.into(),
            details: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert to status code and body
    ///
    /// Expected client errors log at debug, rule rejections and conflicts at
    /// warn, server errors at error. Server error details never reach the client.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        let status = self.status_code();
        match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                let mut body = ErrorResponse::new("VALIDATION_ERROR", "Request validation failed");
                body.details =
                    Some(serde_json::to_value(errors).unwrap_or(serde_json::json!({})));
                (status, body)
            }
            ApiError::BadRequest(message) => {
                debug!("Bad request: {}", message);
                (status, ErrorResponse::new("BAD_REQUEST", message.clone()))
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                (
                    status,
                    ErrorResponse::new(
                        "NOT_FOUND",
                        format!("{} with id {} not found", resource, id),
                    ),
                )
            }
            ApiError::Conflict { message } => {
                warn!("Conflict error: {}", message);
                (status, ErrorResponse::new("CONFLICT", message.clone()))
            }
            ApiError::BusinessRule(message) => {
                warn!("Business rule violation: {}", message);
                (
                    status,
                    ErrorResponse::new("BUSINESS_RULE_VIOLATION", message.clone()),
                )
            }
            ApiError::DatabaseError(db_error) => {
                error!("Database error: {:?}", db_error);
                (
                    status,
                    ErrorResponse::new("DATABASE_ERROR", "A database error occurred"),
                )
            }
            ApiError::InternalError(internal_msg) => {
                error!("Internal error: {}", internal_msg);
                (
                    status,
                    ErrorResponse::new("INTERNAL_ERROR", "An internal server error occurred"),
                )
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        ApiError::DatabaseError(error)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}

impl From<PromotionError> for ApiError {
    fn from(error: PromotionError) -> Self {
        match error {
            PromotionError::NotFound(id) => ApiError::NotFound {
                resource: "Promotion".to_string(),
                id: id.to_string(),
            },
            PromotionError::InvalidPromotion(_) | PromotionError::InvalidCart(_) => {
                ApiError::BadRequest(error.to_string())
            }
            PromotionError::DuplicateCode(_) => ApiError::Conflict {
                message: error.to_string(),
            },
            PromotionError::MemberLookup(message) => ApiError::InternalError(message),
            PromotionError::DatabaseError(e) => ApiError::DatabaseError(e),
        }
    }
}

impl From<LoyaltyError> for ApiError {
    fn from(error: LoyaltyError) -> Self {
        match error {
            LoyaltyError::MemberNotFound(id) => ApiError::NotFound {
                resource: "Member".to_string(),
                id: id.to_string(),
            },
            LoyaltyError::InvalidConfiguration(_) => ApiError::BadRequest(error.to_string()),
            LoyaltyError::InvalidTransaction(_)
            | LoyaltyError::InsufficientPoints { .. }
            | LoyaltyError::RedemptionRejected(_)
            | LoyaltyError::ProgramDisabled => ApiError::BusinessRule(error.to_string()),
            LoyaltyError::DatabaseError(e) => ApiError::DatabaseError(e),
            LoyaltyError::CalculationError(_)
            | LoyaltyError::JsonError(_)
            | LoyaltyError::Io(_) => ApiError::InternalError(error.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(error: ImportError) -> Self {
        match error {
            ImportError::Pattern(_) => ApiError::InternalError(error.to_string()),
            _ => ApiError::BadRequest(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BusinessRule("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Conflict { message: "x".into() }.status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_promotion_error_mapping() {
        let err: ApiError = PromotionError::NotFound(Uuid::nil()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err: ApiError = PromotionError::DuplicateCode("SALE".into()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = PromotionError::InvalidCart("empty".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_loyalty_error_mapping() {
        let err: ApiError = LoyaltyError::InsufficientPoints {
            balance: 10,
            requested: 50,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = LoyaltyError::MemberNotFound(Uuid::nil()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err: ApiError = LoyaltyError::CalculationError("overflow".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_import_error_mapping() {
        let err: ApiError = ImportError::EmptyInput.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let (status, body) = ApiError::InternalError("secret path /etc".into()).to_error_response();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error_code, "INTERNAL_ERROR");
        assert!(!body.message.contains("secret"));
    }
}
