use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::completeness::{
    CompletenessServiceError, RepositoryError, UnknownCheckType,
};
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
    Json(serde_json::Error),
    Export(csv::Error),
    CheckSelection(UnknownCheckType),
    Completeness(CompletenessServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Json(err) => write!(f, "invalid json: {}", err),
            AppError::Export(err) => write!(f, "csv export error: {}", err),
            AppError::CheckSelection(err) => write!(f, "{}", err),
            AppError::Completeness(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::CheckSelection(err) => Some(err),
            AppError::Completeness(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Json(_) | AppError::CheckSelection(_) => StatusCode::BAD_REQUEST,
            AppError::Completeness(
                CompletenessServiceError::DocumentNotFound(_)
                | CompletenessServiceError::RuleSetNotFound(_)
                | CompletenessServiceError::IssueNotFound(_),
            ) => StatusCode::NOT_FOUND,
            AppError::Completeness(
                CompletenessServiceError::InvalidRegistration(_)
                | CompletenessServiceError::InvalidRuleSet(_),
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Completeness(CompletenessServiceError::Repository(
                RepositoryError::Conflict,
            )) => StatusCode::CONFLICT,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Export(_)
            | AppError::Completeness(_) => StatusCode::INTERNAL_SERVER_ERROR,
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

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value)
    }
}

impl From<UnknownCheckType> for AppError {
    fn from(value: UnknownCheckType) -> Self {
        Self::CheckSelection(value)
    }
}

impl From<CompletenessServiceError> for AppError {
    fn from(value: CompletenessServiceError) -> Self {
        Self::Completeness(value)
    }
}
