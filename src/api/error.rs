use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::WorkflowError;
use crate::store::StoreError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Missing or unknown caller
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed input that never reached a workflow
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Workflow(WorkflowError::Store(e))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn workflow_status(e: &WorkflowError) -> StatusCode {
    match e {
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::NotFound { .. } | WorkflowError::AttendeeNotFound { .. } => StatusCode::NOT_FOUND,
        WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
        WorkflowError::PrerequisitesNotMet { .. }
        | WorkflowError::ActiveAgendaExists { .. }
        | WorkflowError::AlreadyExists { .. }
        | WorkflowError::InvalidTransition { .. }
        | WorkflowError::NotEditable { .. }
        | WorkflowError::AlreadySigned { .. }
        | WorkflowError::MinutesClosed { .. } => StatusCode::CONFLICT,
        WorkflowError::Store(_) | WorkflowError::ObjectStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn workflow_details(e: &WorkflowError) -> Option<serde_json::Value> {
    match e {
        WorkflowError::PrerequisitesNotMet { missing } => Some(json!({ "missing": missing })),
        WorkflowError::ActiveAgendaExists { request_id, agenda_id } => {
            Some(json!({ "request_id": request_id, "agenda_id": agenda_id }))
        }
        WorkflowError::InvalidTransition { entity, from, to } => {
            Some(json!({ "entity": entity, "from": from, "to": to }))
        }
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", None),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::Workflow(e) => (workflow_status(e), e.code(), workflow_details(e)),
        };

        // Internal causes stay in the logs
        let message = if status.is_server_error() {
            error!(code, error = %self, "Request failed with internal error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;
