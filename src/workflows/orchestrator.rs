//! Stateless coordination of the workflow components
//!
//! Every public operation follows the same shape: authorize the principal,
//! check prerequisites, mutate through the owning component and let that
//! component queue its notifications. Each call runs inside its own tracing
//! span carrying a fresh correlation id.

use std::collections::BTreeSet;
use std::future::Future;
use std::str::FromStr;

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, info, Instrument};

use super::*;
use crate::auth::Principal;
use crate::domain::{
    Agenda, AgendaId, AgendaStatus, BudgetSufficiencyRequest, Comment, CommentOrigin, DocumentId, Justification,
    JustificationDocument, JustificationId, JustificationStatus, Minutes, MinutesAttendee, MinutesId,
    MinutesStatus, Notification, NotificationId, Permission, Request, RequestId, RequestStatus, RoleId,
    SufficiencyDocument, SufficiencyId, SufficiencyKind, SupportingDocument, SupportingDocumentStatus, UserId,
};
use crate::store::RequestFilter;
use crate::telemetry::{create_workflow_span, generate_correlation_id};

/// Entity family addressed by the generic change-status route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusDomain {
    #[serde(rename = "justificacion")]
    Justification,
    #[serde(rename = "aquisicion")]
    Request,
    #[serde(rename = "documento")]
    Document,
}

impl FromStr for StatusDomain {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "justificacion" => Ok(StatusDomain::Justification),
            "aquisicion" => Ok(StatusDomain::Request),
            "documento" => Ok(StatusDomain::Document),
            other => Err(WorkflowError::Validation(format!("unknown status domain '{other}'"))),
        }
    }
}

/// Result of a generic status change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusChange {
    Justification(Justification),
    Request(Request),
    Document(SupportingDocument),
}

/// Parse a status from its display label ("En revisión", "Aprobada", ...)
fn parse_status<S: DeserializeOwned>(entity: &str, label: &str) -> WorkflowResult<S> {
    serde_json::from_value(serde_json::Value::String(label.to_string()))
        .map_err(|_| WorkflowError::Validation(format!("'{label}' is not a {entity} status")))
}

#[derive(Clone)]
pub struct WorkflowOrchestrator {
    ctx: WorkflowContext,
    requests: RequestLifecycle,
    justifications: JustificationWorkflow,
    sufficiencies: BudgetSufficiencyWorkflow,
    documents: SupportingDocuments,
    agendas: CommitteeAgendaScheduler,
    confirmations: ParticipantConfirmationTracker,
    minutes: MinutesWorkflow,
    comments: CommentThread,
}

impl WorkflowOrchestrator {
    pub fn new(ctx: WorkflowContext, sufficiency_roles: BTreeSet<RoleId>) -> Self {
        Self {
            requests: RequestLifecycle::new(ctx.clone()),
            justifications: JustificationWorkflow::new(ctx.clone()),
            sufficiencies: BudgetSufficiencyWorkflow::new(ctx.clone(), sufficiency_roles),
            documents: SupportingDocuments::new(ctx.clone()),
            agendas: CommitteeAgendaScheduler::new(ctx.clone()),
            confirmations: ParticipantConfirmationTracker::new(ctx.clone()),
            minutes: MinutesWorkflow::new(ctx.clone()),
            comments: CommentThread::new(ctx.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }

    async fn traced<T, F>(&self, operation: &'static str, principal: &Principal, fut: F) -> WorkflowResult<T>
    where
        F: Future<Output = WorkflowResult<T>>,
    {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(operation, Some(principal.user_id), &correlation_id);
        let result = fut.instrument(span.clone()).await;

        if let Err(e) = &result {
            span.in_scope(|| {
                if e.is_user_actionable() {
                    info!(code = e.code(), error = %e, "Operation rejected");
                } else {
                    error!(code = e.code(), error = %e, "Operation failed");
                }
            });
        }
        result
    }

    /// The request must be the principal's own, or they need `permission`
    async fn authorize_request(&self, principal: &Principal, request_id: RequestId, permission: Permission) -> WorkflowResult<Request> {
        let request = self.requests.get(request_id).await?;
        principal.require_owner_or(request.requester_id, permission)?;
        Ok(request)
    }

    // Requests

    pub async fn create_request(&self, principal: &Principal, new: NewRequest) -> WorkflowResult<Request> {
        self.traced("create_request", principal, self.requests.create(principal.user_id, new))
            .await
    }

    pub async fn get_request(&self, principal: &Principal, id: RequestId) -> WorkflowResult<Request> {
        self.traced("get_request", principal, self.requests.get(id)).await
    }

    pub async fn list_requests(&self, principal: &Principal, filter: RequestFilter) -> WorkflowResult<Vec<Request>> {
        self.traced("list_requests", principal, async { self.requests.list(&filter).await })
            .await
    }

    pub async fn update_request(&self, principal: &Principal, id: RequestId, edit: RequestEdit) -> WorkflowResult<Request> {
        self.traced("update_request", principal, async {
            self.authorize_request(principal, id, Permission::SubmitAnyRequest).await?;
            self.requests.update(id, edit).await
        })
        .await
    }

    pub async fn sign_request(&self, principal: &Principal, id: RequestId) -> WorkflowResult<Request> {
        self.traced("sign_request", principal, async {
            self.authorize_request(principal, id, Permission::SubmitAnyRequest).await?;
            self.requests.sign(principal.user_id, id).await
        })
        .await
    }

    // Justifications

    pub async fn create_justification(
        &self,
        principal: &Principal,
        request_id: RequestId,
        fields: JustificationFields,
    ) -> WorkflowResult<Justification> {
        self.traced("create_justification", principal, async {
            self.authorize_request(principal, request_id, Permission::SubmitAnyRequest).await?;
            self.justifications.create(request_id, fields).await
        })
        .await
    }

    pub async fn get_justification(&self, principal: &Principal, request_id: RequestId) -> WorkflowResult<Justification> {
        self.traced("get_justification", principal, self.justifications.get_by_request(request_id))
            .await
    }

    pub async fn update_justification(
        &self,
        principal: &Principal,
        request_id: RequestId,
        fields: JustificationFields,
    ) -> WorkflowResult<Justification> {
        self.traced("update_justification", principal, async {
            self.authorize_request(principal, request_id, Permission::SubmitAnyRequest).await?;
            self.justifications.update(request_id, fields).await
        })
        .await
    }

    pub async fn attach_justification_document(
        &self,
        principal: &Principal,
        justification_id: JustificationId,
        doc: NewJustificationDocument,
    ) -> WorkflowResult<JustificationDocument> {
        self.traced("attach_justification_document", principal, async {
            let justification = self.justifications.get(justification_id).await?;
            self.authorize_request(principal, justification.request_id, Permission::SubmitAnyRequest)
                .await?;
            self.justifications.attach_document(justification_id, doc).await
        })
        .await
    }

    pub async fn list_justification_documents(
        &self,
        principal: &Principal,
        justification_id: JustificationId,
    ) -> WorkflowResult<Vec<JustificationDocument>> {
        self.traced("list_justification_documents", principal, async {
            self.justifications.get(justification_id).await?;
            self.justifications.list_documents(justification_id).await
        })
        .await
    }

    pub async fn remove_justification_document(&self, principal: &Principal, document_id: DocumentId) -> WorkflowResult<()> {
        self.traced("remove_justification_document", principal, async {
            let doc = self
                .ctx
                .store
                .get_justification_document(document_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("justification document", document_id))?;
            let justification = self.justifications.get(doc.justification_id).await?;
            self.authorize_request(principal, justification.request_id, Permission::SubmitAnyRequest)
                .await?;
            self.justifications.remove_document(document_id).await
        })
        .await
    }

    // Budget sufficiency

    pub async fn create_sufficiency(
        &self,
        principal: &Principal,
        request_id: RequestId,
        kind: SufficiencyKind,
        fields: SufficiencyFields,
    ) -> WorkflowResult<BudgetSufficiencyRequest> {
        self.traced("create_sufficiency", principal, async {
            self.authorize_request(principal, request_id, Permission::SubmitAnyRequest).await?;
            self.sufficiencies.create(request_id, kind, fields).await
        })
        .await
    }

    pub async fn find_sufficiency(
        &self,
        principal: &Principal,
        request_id: RequestId,
        kind: SufficiencyKind,
    ) -> WorkflowResult<BudgetSufficiencyRequest> {
        self.traced("find_sufficiency", principal, self.sufficiencies.find(request_id, kind))
            .await
    }

    pub async fn get_sufficiency(&self, principal: &Principal, id: SufficiencyId) -> WorkflowResult<BudgetSufficiencyRequest> {
        self.traced("get_sufficiency", principal, self.sufficiencies.get(id)).await
    }

    pub async fn update_sufficiency(
        &self,
        principal: &Principal,
        id: SufficiencyId,
        fields: SufficiencyFields,
    ) -> WorkflowResult<BudgetSufficiencyRequest> {
        self.traced("update_sufficiency", principal, async {
            let record = self.sufficiencies.get(id).await?;
            self.authorize_request(principal, record.request_id, Permission::SubmitAnyRequest)
                .await?;
            self.sufficiencies.update(id, fields).await
        })
        .await
    }

    pub async fn send_sufficiency(&self, principal: &Principal, id: SufficiencyId) -> WorkflowResult<BudgetSufficiencyRequest> {
        self.traced("send_sufficiency", principal, async {
            let record = self.sufficiencies.get(id).await?;
            self.authorize_request(principal, record.request_id, Permission::ManageSufficiency)
                .await?;
            self.sufficiencies.send_for_processing(principal.user_id, id).await
        })
        .await
    }

    pub async fn upload_sufficiency_response(
        &self,
        principal: &Principal,
        id: SufficiencyId,
        upload: SufficiencyResponseUpload,
    ) -> WorkflowResult<(SufficiencyDocument, BudgetSufficiencyRequest)> {
        self.traced("upload_sufficiency_response", principal, async {
            principal.require(Permission::ManageSufficiency)?;
            self.sufficiencies.upload_response(principal.user_id, id, upload).await
        })
        .await
    }

    pub async fn list_sufficiency_responses(
        &self,
        principal: &Principal,
        id: SufficiencyId,
    ) -> WorkflowResult<Vec<SufficiencyDocument>> {
        self.traced("list_sufficiency_responses", principal, self.sufficiencies.list_responses(id))
            .await
    }

    // Supporting documents

    pub async fn attach_document(
        &self,
        principal: &Principal,
        request_id: RequestId,
        doc: NewSupportingDocument,
    ) -> WorkflowResult<SupportingDocument> {
        self.traced("attach_document", principal, async {
            self.authorize_request(principal, request_id, Permission::SubmitAnyRequest).await?;
            self.documents.attach(request_id, doc).await
        })
        .await
    }

    pub async fn list_documents(&self, principal: &Principal, request_id: RequestId) -> WorkflowResult<Vec<SupportingDocument>> {
        self.traced("list_documents", principal, async {
            self.requests.get(request_id).await?;
            self.documents.list(request_id).await
        })
        .await
    }

    pub async fn remove_document(&self, principal: &Principal, id: DocumentId) -> WorkflowResult<()> {
        self.traced("remove_document", principal, async {
            let doc = self.documents.get(id).await?;
            self.authorize_request(principal, doc.request_id, Permission::SubmitAnyRequest)
                .await?;
            self.documents.remove(id).await
        })
        .await
    }

    // Generic status router

    pub async fn change_status(
        &self,
        principal: &Principal,
        domain: StatusDomain,
        id: u64,
        status: &str,
    ) -> WorkflowResult<StatusChange> {
        self.traced("change_status", principal, async {
            principal.require(Permission::ReviewRequests)?;
            let actor = principal.user_id;
            match domain {
                StatusDomain::Justification => {
                    let next: JustificationStatus = parse_status("justification", status)?;
                    self.justifications
                        .change_status(actor, id, next)
                        .await
                        .map(StatusChange::Justification)
                }
                StatusDomain::Request => {
                    let next: RequestStatus = parse_status("request", status)?;
                    self.requests.transition(actor, id, next).await.map(StatusChange::Request)
                }
                StatusDomain::Document => {
                    let next: SupportingDocumentStatus = parse_status("document", status)?;
                    self.documents
                        .change_status(actor, id, next)
                        .await
                        .map(StatusChange::Document)
                }
            }
        })
        .await
    }

    // Agendas

    pub async fn create_agenda(&self, principal: &Principal, new: NewAgenda) -> WorkflowResult<Agenda> {
        self.traced("create_agenda", principal, async {
            principal.require(Permission::ManageAgendas)?;
            self.agendas.create(principal.user_id, new).await
        })
        .await
    }

    pub async fn get_agenda(&self, principal: &Principal, id: AgendaId) -> WorkflowResult<Agenda> {
        self.traced("get_agenda", principal, self.agendas.get(id)).await
    }

    pub async fn list_agendas(&self, principal: &Principal) -> WorkflowResult<Vec<Agenda>> {
        self.traced("list_agendas", principal, self.agendas.list()).await
    }

    pub async fn agenda_for_request(&self, principal: &Principal, request_id: RequestId) -> WorkflowResult<Agenda> {
        self.traced("agenda_for_request", principal, self.agendas.current_for_request(request_id))
            .await
    }

    pub async fn my_agendas(&self, principal: &Principal) -> WorkflowResult<Vec<UserAgenda>> {
        self.traced("my_agendas", principal, self.confirmations.agendas_for_user(principal.user_id))
            .await
    }

    pub async fn update_agenda(&self, principal: &Principal, id: AgendaId, update: AgendaUpdate) -> WorkflowResult<Agenda> {
        self.traced("update_agenda", principal, async {
            principal.require(Permission::ManageAgendas)?;
            self.agendas.update(principal.user_id, id, update).await
        })
        .await
    }

    pub async fn set_agenda_status(&self, principal: &Principal, id: AgendaId, status: &str) -> WorkflowResult<Agenda> {
        self.traced("set_agenda_status", principal, async {
            principal.require(Permission::ManageAgendas)?;
            let next: AgendaStatus = parse_status("agenda", status)?;
            self.agendas.set_status(id, next).await
        })
        .await
    }

    pub async fn agenda_participants(&self, principal: &Principal, id: AgendaId) -> WorkflowResult<RosterView> {
        self.traced("agenda_participants", principal, self.confirmations.roster(id))
            .await
    }

    pub async fn mark_agenda_seen(
        &self,
        principal: &Principal,
        agenda_id: AgendaId,
        user_id: UserId,
    ) -> WorkflowResult<crate::domain::AgendaParticipant> {
        self.traced("mark_agenda_seen", principal, async {
            principal.require_owner_or(user_id, Permission::ManageAgendas)?;
            self.confirmations.mark_seen(agenda_id, user_id).await
        })
        .await
    }

    pub async fn confirm_attendance(
        &self,
        principal: &Principal,
        agenda_id: AgendaId,
        user_id: UserId,
        observations: Option<String>,
    ) -> WorkflowResult<crate::domain::AgendaParticipant> {
        self.traced("confirm_attendance", principal, async {
            principal.require_owner_or(user_id, Permission::ManageAgendas)?;
            self.confirmations.mark_confirmed(agenda_id, user_id, observations).await
        })
        .await
    }

    /// Complete agendas left provisional by an interrupted creation
    pub async fn recover_agendas(&self, principal: &Principal) -> WorkflowResult<RecoveryReport> {
        self.traced("recover_agendas", principal, self.agendas.recover_provisional(principal.user_id))
            .await
    }

    // Comments

    pub async fn add_comment(&self, principal: &Principal, new: NewComment) -> WorkflowResult<Comment> {
        self.traced("add_comment", principal, self.comments.add(principal.user_id, new))
            .await
    }

    pub async fn list_comments(&self, principal: &Principal, origin: CommentOrigin, origin_id: u64) -> WorkflowResult<Vec<Comment>> {
        self.traced("list_comments", principal, self.comments.list(origin, origin_id))
            .await
    }

    // Minutes

    pub async fn create_minutes(
        &self,
        principal: &Principal,
        new: NewMinutes,
    ) -> WorkflowResult<(Minutes, Vec<MinutesAttendee>)> {
        self.traced("create_minutes", principal, async {
            principal.require(Permission::ManageAgendas)?;
            self.minutes.create(principal.user_id, new).await
        })
        .await
    }

    pub async fn get_minutes(&self, principal: &Principal, id: MinutesId) -> WorkflowResult<(Minutes, Vec<MinutesAttendee>)> {
        self.traced("get_minutes", principal, async {
            let minutes = self.minutes.get(id).await?;
            let attendees = self.minutes.attendees(id).await?;
            Ok((minutes, attendees))
        })
        .await
    }

    pub async fn minutes_for_agenda(
        &self,
        principal: &Principal,
        agenda_id: AgendaId,
    ) -> WorkflowResult<(Minutes, Vec<MinutesAttendee>)> {
        self.traced("minutes_for_agenda", principal, async {
            let minutes = self.minutes.get_by_agenda(agenda_id).await?;
            let attendees = self.minutes.attendees(minutes.id).await?;
            Ok((minutes, attendees))
        })
        .await
    }

    pub async fn set_minutes_status(&self, principal: &Principal, id: MinutesId, status: &str) -> WorkflowResult<Minutes> {
        self.traced("set_minutes_status", principal, async {
            principal.require(Permission::ManageAgendas)?;
            let next: MinutesStatus = parse_status("minutes", status)?;
            self.minutes.set_status(id, next).await
        })
        .await
    }

    /// Attendees only act for themselves
    pub async fn respond_to_minutes(
        &self,
        principal: &Principal,
        id: MinutesId,
        user_id: UserId,
        comment: Option<String>,
    ) -> WorkflowResult<MinutesAttendee> {
        self.traced("respond_to_minutes", principal, async {
            if principal.user_id != user_id {
                return Err(WorkflowError::Forbidden(format!(
                    "user {} cannot sign for user {user_id}",
                    principal.user_id
                )));
            }
            self.minutes
                .respond(id, user_id, AttendeeAction::from_comment(comment))
                .await
        })
        .await
    }

    // Notifications

    pub async fn my_notifications(&self, principal: &Principal) -> WorkflowResult<Vec<Notification>> {
        self.traced("my_notifications", principal, async {
            let all = self.ctx.store.list_notifications().await?;
            Ok(all
                .into_iter()
                .filter(|n| n.target.matches(principal.user_id, &principal.roles))
                .collect())
        })
        .await
    }

    pub async fn mark_notification_read(&self, principal: &Principal, id: NotificationId) -> WorkflowResult<Notification> {
        self.traced("mark_notification_read", principal, async {
            let mut notification = self
                .ctx
                .store
                .get_notification(id)
                .await?
                .filter(|n| n.target.matches(principal.user_id, &principal.roles))
                .ok_or_else(|| WorkflowError::not_found("notification", id))?;

            if !notification.read {
                notification.read = true;
                self.ctx.store.update_notification(&notification).await?;
                info!(notification_id = id, read_at = %Utc::now(), "Notification read");
            }
            Ok(notification)
        })
        .await
    }
}
