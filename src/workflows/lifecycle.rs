use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::{ensure_transition, require_fields, WorkflowContext};
use crate::domain::{
    DepartmentId, NotificationCategory, Request, RequestId, RequestStatus, UserId, WorkflowStatus,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::store::RequestFilter;

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub folio: String,
    pub department_id: DepartmentId,
    pub amount: Decimal,
    pub acquisition_type_id: u64,
    pub motive: String,
}

/// Editable request fields; all of them are replaced on update
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEdit {
    pub amount: Decimal,
    pub acquisition_type_id: u64,
    pub motive: String,
}

/// Owns the request status and its legal transitions
#[derive(Clone)]
pub struct RequestLifecycle {
    ctx: WorkflowContext,
}

impl RequestLifecycle {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, requester_id: UserId, new: NewRequest) -> WorkflowResult<Request> {
        require_fields(&[("folio", new.folio.as_str()), ("motive", new.motive.as_str())])?;
        validate_amount(new.amount)?;

        let now = Utc::now();
        let request = self
            .ctx
            .store
            .insert_request(Request {
                id: 0,
                folio: new.folio,
                requester_id,
                department_id: new.department_id,
                amount: new.amount,
                acquisition_type_id: new.acquisition_type_id,
                motive: new.motive,
                status: RequestStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(request_id = request.id, folio = %request.folio, "Request created");
        Ok(request)
    }

    pub async fn get(&self, id: RequestId) -> WorkflowResult<Request> {
        self.ctx
            .store
            .get_request(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("request", id))
    }

    pub async fn list(&self, filter: &RequestFilter) -> WorkflowResult<Vec<Request>> {
        Ok(self.ctx.store.list_requests(filter).await?)
    }

    pub async fn update(&self, id: RequestId, edit: RequestEdit) -> WorkflowResult<Request> {
        let mut request = self.get(id).await?;
        if !request.status.allows_edits() {
            return Err(WorkflowError::NotEditable {
                entity: "request",
                id,
                status: request.status.label(),
            });
        }
        require_fields(&[("motive", edit.motive.as_str())])?;
        validate_amount(edit.amount)?;

        request.amount = edit.amount;
        request.acquisition_type_id = edit.acquisition_type_id;
        request.motive = edit.motive;
        request.updated_at = Utc::now();
        self.ctx.store.update_request(&request).await?;
        Ok(request)
    }

    /// Artifacts a request still needs before it can go under review
    pub async fn missing_prerequisites(&self, id: RequestId) -> WorkflowResult<Vec<String>> {
        let store = &self.ctx.store;
        let mut missing = Vec::new();

        if store.get_justification_by_request(id).await?.is_none() {
            missing.push("justificación".to_string());
        }
        if store.list_sufficiencies(id).await?.is_empty() {
            missing.push("suficiencia presupuestal".to_string());
        }
        if store.list_supporting_documents(id).await?.is_empty() {
            missing.push("documento de soporte".to_string());
        }

        Ok(missing)
    }

    /// Submit the request for review
    pub async fn sign(&self, actor: UserId, id: RequestId) -> WorkflowResult<Request> {
        self.transition(actor, id, RequestStatus::UnderReview).await
    }

    /// Move a request one step along its table and notify its owner
    pub async fn transition(&self, actor: UserId, id: RequestId, next: RequestStatus) -> WorkflowResult<Request> {
        let request = self.apply(id, next).await?;

        self.ctx
            .notifier
            .send_to_user(
                request.requester_id,
                format!("Solicitud {}", request.folio),
                format!("Tu solicitud cambió a estado '{}'", next.label()),
                NotificationCategory::Request,
                actor,
            )
            .await;

        Ok(request)
    }

    /// Same table check as `transition`, without the owner notification.
    ///
    /// Used when the move is a side effect of another workflow (agenda
    /// creation) whose own notifications already reach the people involved.
    pub async fn transition_silently(&self, id: RequestId, next: RequestStatus) -> WorkflowResult<Request> {
        self.apply(id, next).await
    }

    async fn apply(&self, id: RequestId, next: RequestStatus) -> WorkflowResult<Request> {
        let mut request = self.get(id).await?;
        ensure_transition("request", request.status, next)?;

        if next == RequestStatus::UnderReview {
            let missing = self.missing_prerequisites(id).await?;
            if !missing.is_empty() {
                return Err(WorkflowError::PrerequisitesNotMet { missing });
            }
        }

        let previous = request.status;
        request.status = next;
        request.updated_at = Utc::now();
        self.ctx.store.update_request(&request).await?;

        info!(
            request_id = id,
            from = previous.label(),
            to = next.label(),
            "Request status changed"
        );
        Ok(request)
    }
}

fn validate_amount(amount: Decimal) -> WorkflowResult<()> {
    if amount <= Decimal::ZERO {
        return Err(WorkflowError::Validation("amount must be greater than zero".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationTarget;
    use crate::store::NotificationStore;
    use crate::workflows::test_support::*;

    fn new_request() -> NewRequest {
        NewRequest {
            folio: "F-001".to_string(),
            department_id: 4,
            amount: amount(),
            acquisition_type_id: 2,
            motive: "Equipo de cómputo".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let fx = fixture().await;
        let lifecycle = RequestLifecycle::new(fx.ctx.clone());

        let request = lifecycle.create(1, new_request()).await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.requester_id, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_non_positive_amount() {
        let fx = fixture().await;
        let lifecycle = RequestLifecycle::new(fx.ctx.clone());

        let mut new = new_request();
        new.amount = Decimal::ZERO;
        assert!(matches!(lifecycle.create(1, new).await, Err(WorkflowError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sign_lists_every_missing_artifact() {
        let fx = fixture().await;
        let lifecycle = RequestLifecycle::new(fx.ctx.clone());
        let request = lifecycle.create(1, new_request()).await.unwrap();

        match lifecycle.sign(1, request.id).await {
            Err(WorkflowError::PrerequisitesNotMet { missing }) => assert_eq!(missing.len(), 3),
            other => panic!("expected PrerequisitesNotMet, got {other:?}"),
        }
        assert_eq!(lifecycle.get(request.id).await.unwrap().status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_transition_notifies_owner() {
        let fx = fixture().await;
        let lifecycle = RequestLifecycle::new(fx.ctx.clone());
        let request = lifecycle.create(1, new_request()).await.unwrap();

        lifecycle.transition(30, request.id, RequestStatus::Cancelled).await.unwrap();

        let notifications = fx.store.list_notifications().await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].target, NotificationTarget::User(1));
        assert_eq!(notifications[0].origin_user, 30);
        assert!(notifications[0].body.contains("Cancelada"));
    }

    #[tokio::test]
    async fn test_silent_transition_checks_table_without_notifying() {
        let fx = fixture().await;
        let lifecycle = RequestLifecycle::new(fx.ctx.clone());
        let approved = seed_request(&fx.store, RequestStatus::Approved).await;

        let moved = lifecycle
            .transition_silently(approved.id, RequestStatus::InCommittee)
            .await
            .unwrap();
        assert_eq!(moved.status, RequestStatus::InCommittee);
        assert!(fx.store.list_notifications().await.unwrap().is_empty());

        assert!(matches!(
            lifecycle.transition_silently(approved.id, RequestStatus::Pending).await,
            Err(WorkflowError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_blocked_while_approved() {
        let fx = fixture().await;
        let lifecycle = RequestLifecycle::new(fx.ctx.clone());
        let mut request = lifecycle.create(1, new_request()).await.unwrap();
        request.status = RequestStatus::Approved;
        fx.ctx.store.update_request(&request).await.unwrap();

        let edit = RequestEdit {
            amount: amount(),
            acquisition_type_id: 2,
            motive: "Otro motivo".to_string(),
        };
        assert!(matches!(
            lifecycle.update(request.id, edit).await,
            Err(WorkflowError::NotEditable { .. })
        ));
    }
}
