use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::commitments::repository::StoreError;
use crate::workflows::commitments::service::AgreementServiceError;
use crate::workflows::datalock::service::TriageServiceError;
use crate::workflows::updates::service::UpdateServiceError;
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
    Agreement(AgreementServiceError),
    Update(UpdateServiceError),
    Triage(TriageServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Agreement(err) => write!(f, "workflow error: {}", err),
            AppError::Update(err) => write!(f, "workflow error: {}", err),
            AppError::Triage(err) => write!(f, "workflow error: {}", err),
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
            AppError::Agreement(err) => Some(err),
            AppError::Update(err) => Some(err),
            AppError::Triage(err) => Some(err),
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Conflict | StoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Validation failures are the caller's to fix; authorization
        // failures get their own code so clients can tell them apart;
        // invalid-state faults are integrity problems, not user input.
        let status = match &self {
            AppError::Agreement(AgreementServiceError::Validation(_))
            | AppError::Update(UpdateServiceError::Validation(_))
            | AppError::Triage(TriageServiceError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Agreement(AgreementServiceError::Authorization(_))
            | AppError::Update(UpdateServiceError::Authorization(_)) => StatusCode::FORBIDDEN,
            AppError::Agreement(AgreementServiceError::Store(err))
            | AppError::Update(UpdateServiceError::Store(err))
            | AppError::Triage(TriageServiceError::Store(err)) => store_status(err),
            AppError::Agreement(_) | AppError::Update(_) | AppError::Triage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

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

impl From<AgreementServiceError> for AppError {
    fn from(value: AgreementServiceError) -> Self {
        Self::Agreement(value)
    }
}

impl From<UpdateServiceError> for AppError {
    fn from(value: UpdateServiceError) -> Self {
        Self::Update(value)
    }
}

impl From<TriageServiceError> for AppError {
    fn from(value: TriageServiceError) -> Self {
        Self::Triage(value)
    }
}
