use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use goldsmith_core::errors::{ApplicationError, DomainError, InterfaceError};
use goldsmith_core::session::SessionError;
use goldsmith_db::RepositoryError;
use serde::Serialize;
use tracing::{error, warn};

/// JSON error returned by every API handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, correlation_id: &str) -> Self {
        Self { status, message: message.into(), correlation_id: correlation_id.to_string() }
    }

    pub fn unauthorized(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, correlation_id)
    }

    pub fn forbidden(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, message, correlation_id)
    }

    pub fn not_found(what: &str, correlation_id: &str) -> Self {
        Self::from_application(ApplicationError::NotFound(what.to_string()), correlation_id)
    }

    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self::from(error.into_interface(correlation_id))
    }

    pub fn from_domain(error: DomainError, correlation_id: &str) -> Self {
        Self::from_application(ApplicationError::Domain(error), correlation_id)
    }

    pub fn from_repository(error: RepositoryError, correlation_id: &str) -> Self {
        error!(
            event_name = "server.repository.error",
            correlation_id = %correlation_id,
            error = %error,
            "repository call failed"
        );
        Self::from_application(ApplicationError::from(error), correlation_id)
    }

    pub fn from_session(error: SessionError, correlation_id: &str) -> Self {
        warn!(
            event_name = "server.session.rejected",
            correlation_id = %correlation_id,
            error = %error,
            "session token rejected"
        );
        Self::unauthorized(error.to_string(), correlation_id)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        let status = match &error {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &error {
            // Storage and configuration details stay in the logs.
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                error.user_message().to_string()
            }
            InterfaceError::BadRequest { message, .. }
            | InterfaceError::Forbidden { message, .. }
            | InterfaceError::NotFound { message, .. } => message.clone(),
        };
        Self { status, message, correlation_id: error.correlation_id().to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: self.message, correlation_id: self.correlation_id };
        (self.status, Json(body)).into_response()
    }
}
