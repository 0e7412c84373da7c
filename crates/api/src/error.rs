use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::models::TransitionError;
use serde::Serialize;
use thiserror::Error;

use crate::services::{
    LifecycleError, MaintenanceError, NotificationError, ProbeError, WebhookDeliveryError,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => ApiError::Conflict("Resource already exists".into()),
                        "23503" => ApiError::NotFound("Referenced resource not found".into()),
                        _ => ApiError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    ApiError::Internal(format!("Database error: {}", db_err))
                }
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e.message.clone().map(|m| m.to_string()).unwrap_or_default(),
                })
            })
            .collect();

        // Schema-level (struct) errors are reported under __all__
        if details.is_empty() {
            details.push(ValidationDetail {
                field: "__all__".into(),
                message: errors.to_string(),
            });
        }

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation(message)
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotAllowed { .. } => ApiError::Conflict(err.to_string()),
            TransitionError::Invalid(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Database(e) => e.into(),
            LifecycleError::Transition(e) => e.into(),
            LifecycleError::NotFound(msg) => ApiError::NotFound(msg),
            LifecycleError::Conflict(msg) => ApiError::Conflict(msg),
        }
    }
}

impl From<MaintenanceError> for ApiError {
    fn from(err: MaintenanceError) -> Self {
        match err {
            MaintenanceError::Database(e) => e.into(),
            MaintenanceError::Transition(e) => e.into(),
            MaintenanceError::NotFound(msg) => ApiError::NotFound(msg),
            MaintenanceError::Conflict(msg) => ApiError::Conflict(msg),
            MaintenanceError::Invalid(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<WebhookDeliveryError> for ApiError {
    fn from(err: WebhookDeliveryError) -> Self {
        match err {
            WebhookDeliveryError::Database(e) => e.into(),
            WebhookDeliveryError::NotFound(msg) => ApiError::NotFound(msg),
            WebhookDeliveryError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Database(e) => e.into(),
        }
    }
}

impl From<ProbeError> for ApiError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Database(e) => e.into(),
            ProbeError::NotFound(msg) => ApiError::NotFound(msg),
            ProbeError::Client(e) => ApiError::Internal(format!("HTTP client error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use validator::Validate;

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::Unauthorized("bad signature".into()), StatusCode::UNAUTHORIZED),
            (ApiError::NotFound("title".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("already exists".into()), StatusCode::CONFLICT),
            (ApiError::Validation("invalid input".into()), StatusCode::BAD_REQUEST),
            (ApiError::Internal("db down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::ServiceUnavailable("maintenance".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::NotFound("test".to_string())),
            "Not found: test"
        );
        assert_eq!(
            format!("{}", ApiError::Conflict("test".to_string())),
            "Conflict: test"
        );
        assert_eq!(
            format!("{}", ApiError::Validation("test".to_string())),
            "Validation error: test"
        );
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error: ApiError = sqlx::Error::RowNotFound.into();
        match error {
            ApiError::NotFound(msg) => assert_eq!(msg, "Resource not found"),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_transition_not_allowed_is_conflict() {
        let error: ApiError = TransitionError::NotAllowed {
            entity: "request",
            from: "approved".into(),
            to: "in_review".into(),
        }
        .into();
        match error {
            ApiError::Conflict(msg) => {
                assert!(msg.contains("approved"));
                assert!(msg.contains("in_review"));
            }
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_transition_invalid_is_validation() {
        let error: ApiError = TransitionError::Invalid("bad duration".into()).into();
        assert!(matches!(error, ApiError::Validation(msg) if msg == "bad duration"));
    }

    #[test]
    fn test_lifecycle_errors_map_to_status() {
        let not_found: ApiError = LifecycleError::NotFound("Title x not found".into()).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let conflict: ApiError = LifecycleError::Conflict("modified concurrently".into()).into();
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let transition: ApiError = LifecycleError::Transition(TransitionError::NotAllowed {
            entity: "title",
            from: "rejected".into(),
            to: "approved".into(),
        })
        .into();
        assert_eq!(transition.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_delivery_errors_map_to_status() {
        let error: ApiError = WebhookDeliveryError::NotFound("Delivery x not found".into()).into();
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);

        let error: ApiError = WebhookDeliveryError::Conflict("claimed".into()).into();
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_maintenance_errors_map_to_status() {
        let error: ApiError = MaintenanceError::Invalid("Invalid setting key".into()).into();
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);

        let error: ApiError = MaintenanceError::Transition(TransitionError::NotAllowed {
            entity: "maintenance",
            from: "completed".into(),
            to: "cancelled".into(),
        })
        .into();
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }

    #[derive(Validate)]
    struct CompanyInput {
        #[validate(length(min = 3, message = "Company must be 3-200 characters"))]
        company: String,
    }

    #[test]
    fn test_from_validation_errors_uses_field_message() {
        let errors = CompanyInput {
            company: "ab".into(),
        }
        .validate()
        .unwrap_err();
        let error: ApiError = errors.into();
        assert!(matches!(error, ApiError::Validation(msg) if msg == "Company must be 3-200 characters"));
    }
}
