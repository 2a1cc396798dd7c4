use crate::config::ConfigError;
use crate::lifecycle::repository::RepositoryError;
use crate::lifecycle::sequence::SequenceError;
use crate::lifecycle::service::LifecycleError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Lifecycle(LifecycleError),
    Validation(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Lifecycle(err) => lifecycle_status(err),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn lifecycle_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::EmployeeNotFound(_)
        | LifecycleError::TrainingTypeNotFound(_)
        | LifecycleError::TrainingRecordNotFound(_)
        | LifecycleError::CertificateNotFound(_)
        | LifecycleError::EmployeeCertificateNotFound(_)
        | LifecycleError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        LifecycleError::EmployeeExists(_)
        | LifecycleError::EmployeeHasRecords { .. }
        | LifecycleError::CertificateExists(_)
        | LifecycleError::CertificateNumberInUse(_)
        | LifecycleError::InvalidTransition { .. }
        | LifecycleError::Repository(RepositoryError::Conflict)
        | LifecycleError::Repository(RepositoryError::Constraint(_)) => StatusCode::CONFLICT,
        LifecycleError::RenewalHolderMismatch { .. }
        | LifecycleError::Sequence(SequenceError::InvalidKey(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LifecycleError::Repository(RepositoryError::Unavailable(_))
        | LifecycleError::Sequence(SequenceError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        LifecycleError::Sequence(SequenceError::Exhausted(_)) | LifecycleError::Narrowing(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Lifecycle(err) => write!(f, "{}", err),
            AppError::Validation(message) => write!(f, "invalid request: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Lifecycle(err) => Some(err),
            AppError::Validation(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<LifecycleError> for AppError {
    fn from(value: LifecycleError) -> Self {
        Self::Lifecycle(value)
    }
}
