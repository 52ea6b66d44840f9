use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use storefront_core::errors::{ApplicationError, DomainError, InterfaceError};
use storefront_db::repositories::RepositoryError;
use tracing::{error, warn};

/// HTTP-facing wrapper around [`InterfaceError`].
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    correlation_id: &'a str,
}

impl ApiError {
    pub fn unauthorized(correlation_id: &str) -> Self {
        Self(InterfaceError::Unauthorized {
            message: "a signed-in viewer is required".to_string(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn not_found(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::NotFound {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn application(error: impl Into<ApplicationError>, correlation_id: &str) -> Self {
        Self(error.into().into_interface(correlation_id))
    }

    /// Invalid input is the caller's fault; every other store failure is ours.
    pub fn repository(error: RepositoryError, correlation_id: &str) -> Self {
        let application = match error {
            RepositoryError::InvalidInput(message) => {
                ApplicationError::Domain(DomainError::InvariantViolation(message))
            }
            other => ApplicationError::Persistence(other.to_string()),
        };
        Self::application(application, correlation_id)
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let correlation_id = self.0.correlation_id();

        if status.is_server_error() {
            error!(
                event_name = "http.request.failed",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        } else {
            warn!(
                event_name = "http.request.rejected",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %self.0,
                "request rejected"
            );
        }

        // Server-side failure detail stays in the logs.
        let detail = (!status.is_server_error()).then(|| self.0.to_string());
        let body = ErrorBody { error: self.0.user_message(), detail, correlation_id };
        (status, Json(body)).into_response()
    }
}
