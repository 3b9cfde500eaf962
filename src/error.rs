use thiserror::Error;

use crate::blobs::ObjectStoreError;
use crate::domain::{AgendaId, MinutesId, RequestId, UserId};
use crate::store::StoreError;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors surfaced by workflow operations
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("User {user_id} is not an attendee of minutes {minutes_id}")]
    AttendeeNotFound { minutes_id: MinutesId, user_id: UserId },

    #[error("Prerequisites not met: missing {}", .missing.join(", "))]
    PrerequisitesNotMet { missing: Vec<String> },

    #[error("Request {request_id} already has active agenda {agenda_id}")]
    ActiveAgendaExists { request_id: RequestId, agenda_id: AgendaId },

    #[error("{entity} already exists for {scope}")]
    AlreadyExists { entity: &'static str, scope: String },

    #[error("Invalid {entity} transition from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("{entity} {id} is '{status}' and cannot be edited")]
    NotEditable {
        entity: &'static str,
        id: u64,
        status: &'static str,
    },

    #[error("User {user_id} already signed minutes {minutes_id}")]
    AlreadySigned { minutes_id: MinutesId, user_id: UserId },

    #[error("Minutes {minutes_id} is '{status}' and no longer accepts signatures")]
    MinutesClosed { minutes_id: MinutesId, status: &'static str },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Attachment storage error: {0}")]
    ObjectStore(#[from] ObjectStoreError),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        WorkflowError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Errors the caller can act on; everything else is an internal failure
    pub fn is_user_actionable(&self) -> bool {
        !matches!(self, WorkflowError::Store(_) | WorkflowError::ObjectStore(_))
    }

    /// Stable machine-readable code for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "VALIDATION_ERROR",
            WorkflowError::NotFound { .. } => "NOT_FOUND",
            WorkflowError::AttendeeNotFound { .. } => "ATTENDEE_NOT_FOUND",
            WorkflowError::PrerequisitesNotMet { .. } => "PREREQUISITES_NOT_MET",
            WorkflowError::ActiveAgendaExists { .. } => "ACTIVE_AGENDA_EXISTS",
            WorkflowError::AlreadyExists { .. } => "ALREADY_EXISTS",
            WorkflowError::InvalidTransition { .. } => "INVALID_TRANSITION",
            WorkflowError::NotEditable { .. } => "NOT_EDITABLE",
            WorkflowError::AlreadySigned { .. } => "ALREADY_SIGNED",
            WorkflowError::MinutesClosed { .. } => "MINUTES_CLOSED",
            WorkflowError::Forbidden(_) => "FORBIDDEN",
            WorkflowError::Store(_) => "STORAGE_ERROR",
            WorkflowError::ObjectStore(_) => "STORAGE_SIDE_EFFECT_FAILURE",
        }
    }
}
