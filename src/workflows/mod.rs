// Workflow components for the procurement committee
//
// Each component owns the rules for one entity family and talks to the
// store, the object store and the notification outbox through a shared
// `WorkflowContext`. Authorization lives one level up, in the orchestrator.

pub mod agenda;
pub mod comments;
pub mod confirmation;
pub mod documents;
pub mod justification;
pub mod lifecycle;
pub mod minutes;
pub mod orchestrator;
pub mod sufficiency;

pub use agenda::{AgendaUpdate, CommitteeAgendaScheduler, NewAgenda, RecoveryReport};
pub use comments::{CommentThread, NewComment};
pub use confirmation::{ParticipantConfirmationTracker, ParticipantView, RosterView, UserAgenda};
pub use documents::{NewSupportingDocument, SupportingDocuments};
pub use justification::{JustificationFields, JustificationWorkflow, NewJustificationDocument};
pub use lifecycle::{NewRequest, RequestEdit, RequestLifecycle};
pub use minutes::{AttendeeAction, MinutesWorkflow, NewMinutes};
pub use orchestrator::{StatusChange, StatusDomain, WorkflowOrchestrator};
pub use sufficiency::{BudgetSufficiencyWorkflow, SufficiencyFields, SufficiencyResponseUpload};

use std::sync::Arc;

use tracing::warn;

use crate::blobs::ObjectStore;
use crate::domain::{BlobHandle, PendingBlobDeletion, WorkflowStatus};
use crate::error::{WorkflowError, WorkflowResult};
use crate::notifications::NotificationDispatcher;
use crate::store::WorkflowStore;

/// Collaborators every workflow component needs
#[derive(Clone)]
pub struct WorkflowContext {
    pub store: Arc<dyn WorkflowStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub notifier: NotificationDispatcher,
}

impl WorkflowContext {
    pub fn new(store: Arc<dyn WorkflowStore>, objects: Arc<dyn ObjectStore>) -> Self {
        let notifier = NotificationDispatcher::new(store.clone());
        Self {
            store,
            objects,
            notifier,
        }
    }

    /// Delete a blob without failing the caller.
    ///
    /// A failed delete is queued for the blob reconciler. If even the queue
    /// write fails the handle is only logged.
    pub(crate) async fn discard_blob(&self, handle: &BlobHandle) {
        let Err(e) = self.objects.delete(handle).await else {
            return;
        };

        warn!(handle = %handle, error = %e, "Blob delete failed, queueing for reconciliation");
        let pending = PendingBlobDeletion {
            id: 0,
            handle: handle.clone(),
            attempts: 1,
            last_error: e.to_string(),
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = self.store.insert_pending_deletion(pending).await {
            warn!(handle = %handle, error = %e, "Failed to queue blob deletion");
        }
    }
}

/// Check one step against an entity's transition table
pub(crate) fn ensure_transition<S: WorkflowStatus>(entity: &'static str, from: S, to: S) -> WorkflowResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            entity,
            from: from.label(),
            to: to.label(),
        })
    }
}

/// Reject blank mandatory text fields, naming each one
pub(crate) fn require_fields(fields: &[(&str, &str)]) -> WorkflowResult<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeSet;

    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;

    use super::*;
    use crate::blobs::LocalObjectStore;
    use crate::domain::{Permission, Request, RequestStatus, User, UserId};
    use crate::store::{InMemoryStore, RequestStore, UserStore};

    pub struct Fixture {
        pub store: Arc<InMemoryStore>,
        pub ctx: WorkflowContext,
        pub _blobs: tempfile::TempDir,
    }

    pub async fn fixture() -> Fixture {
        let blobs = tempfile::TempDir::new().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let ctx = WorkflowContext::new(store.clone(), Arc::new(LocalObjectStore::new(blobs.path())));
        for id in [1, 10, 11, 20, 30] {
            store.upsert_user(user(id)).await.unwrap();
        }
        Fixture {
            store,
            ctx,
            _blobs: blobs,
        }
    }

    pub async fn seed_request(store: &InMemoryStore, status: RequestStatus) -> Request {
        let now = chrono::Utc::now();
        store
            .insert_request(Request {
                id: 0,
                folio: "F-001".to_string(),
                requester_id: 1,
                department_id: 4,
                amount: amount(),
                acquisition_type_id: 2,
                motive: "Equipo de cómputo".to_string(),
                status,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    pub fn user(id: UserId) -> User {
        User {
            id,
            name: format!("Usuario {id}"),
            title: "Vocal".to_string(),
            department_id: 4,
            roles: BTreeSet::new(),
            permissions: [Permission::ReviewRequests].into_iter().collect(),
        }
    }

    pub fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 12).unwrap()
    }

    pub fn time() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 30, 0).unwrap()
    }

    pub fn amount() -> Decimal {
        Decimal::new(50_000, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequestStatus;

    #[test]
    fn test_ensure_transition_reports_labels() {
        let err = ensure_transition("request", RequestStatus::Pending, RequestStatus::Approved).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request transition from 'Pendiente' to 'Aprobada'"
        );
    }

    #[test]
    fn test_require_fields_lists_every_blank() {
        let err = require_fields(&[("subject", ""), ("place", "Sala 2"), ("account", "  ")]).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: missing required fields: subject, account");
    }
}
