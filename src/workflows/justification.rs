use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::{ensure_transition, require_fields, WorkflowContext};
use crate::domain::{
    DocumentId, Justification, JustificationDocument, JustificationId, JustificationStatus,
    NotificationCategory, OfficeLetter, RequestId, UserId, WorkflowStatus,
};
use crate::error::{WorkflowError, WorkflowResult};

pub const JUSTIFICATION_FOLDER: &str = "justificaciones";

/// Free-text and office-letter fields, replaced wholesale on update
#[derive(Debug, Clone, Deserialize)]
pub struct JustificationFields {
    pub office_letter: OfficeLetter,
    pub legal_grounds: String,
    pub need: String,
    pub consequences: String,
}

impl JustificationFields {
    fn validate(&self) -> WorkflowResult<()> {
        require_fields(&[
            ("office_letter.number", self.office_letter.number.as_str()),
            ("office_letter.addressee", self.office_letter.addressee.as_str()),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct NewJustificationDocument {
    pub section: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub uploader_id: UserId,
    pub comment: Option<String>,
}

#[derive(Clone)]
pub struct JustificationWorkflow {
    ctx: WorkflowContext,
}

impl JustificationWorkflow {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, request_id: RequestId, fields: JustificationFields) -> WorkflowResult<Justification> {
        let store = &self.ctx.store;
        if store.get_request(request_id).await?.is_none() {
            return Err(WorkflowError::not_found("request", request_id));
        }
        if store.get_justification_by_request(request_id).await?.is_some() {
            return Err(WorkflowError::AlreadyExists {
                entity: "justification",
                scope: format!("request {request_id}"),
            });
        }
        fields.validate()?;

        let now = Utc::now();
        let justification = store
            .insert_justification(Justification {
                id: 0,
                request_id,
                office_letter: fields.office_letter,
                legal_grounds: fields.legal_grounds,
                need: fields.need,
                consequences: fields.consequences,
                status: JustificationStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(request_id, justification_id = justification.id, "Justification created");
        Ok(justification)
    }

    pub async fn get(&self, id: JustificationId) -> WorkflowResult<Justification> {
        self.ctx
            .store
            .get_justification(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("justification", id))
    }

    pub async fn get_by_request(&self, request_id: RequestId) -> WorkflowResult<Justification> {
        self.ctx
            .store
            .get_justification_by_request(request_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("justification for request", request_id))
    }

    pub async fn update(&self, request_id: RequestId, fields: JustificationFields) -> WorkflowResult<Justification> {
        let mut justification = self.get_by_request(request_id).await?;
        if !justification.status.allows_edits() {
            return Err(WorkflowError::NotEditable {
                entity: "justification",
                id: justification.id,
                status: justification.status.label(),
            });
        }
        fields.validate()?;

        justification.office_letter = fields.office_letter;
        justification.legal_grounds = fields.legal_grounds;
        justification.need = fields.need;
        justification.consequences = fields.consequences;
        justification.updated_at = Utc::now();
        self.ctx.store.update_justification(&justification).await?;
        Ok(justification)
    }

    /// Upload first, then record the row; an upload failure leaves no row
    pub async fn attach_document(
        &self,
        justification_id: JustificationId,
        doc: NewJustificationDocument,
    ) -> WorkflowResult<JustificationDocument> {
        self.get(justification_id).await?;
        require_fields(&[("section", doc.section.as_str()), ("file_name", doc.file_name.as_str())])?;

        let handle = self
            .ctx
            .objects
            .upload(JUSTIFICATION_FOLDER, &doc.file_name, doc.bytes)
            .await?;

        let inserted = self
            .ctx
            .store
            .insert_justification_document(JustificationDocument {
                id: 0,
                justification_id,
                section: doc.section,
                handle: handle.clone(),
                file_name: doc.file_name,
                uploader_id: doc.uploader_id,
                comment: doc.comment.filter(|c| !c.trim().is_empty()),
                uploaded_at: Utc::now(),
            })
            .await;
        let row = match inserted {
            Ok(row) => row,
            Err(e) => {
                self.ctx.discard_blob(&handle).await;
                return Err(e.into());
            }
        };

        info!(justification_id, document_id = row.id, section = %row.section, "Justification document attached");
        Ok(row)
    }

    pub async fn list_documents(&self, justification_id: JustificationId) -> WorkflowResult<Vec<JustificationDocument>> {
        Ok(self.ctx.store.list_justification_documents(justification_id).await?)
    }

    /// Remove the row regardless of whether the blob delete succeeds
    pub async fn remove_document(&self, document_id: DocumentId) -> WorkflowResult<()> {
        let doc = self
            .ctx
            .store
            .get_justification_document(document_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("justification document", document_id))?;

        self.ctx.discard_blob(&doc.handle).await;
        self.ctx.store.delete_justification_document(document_id).await?;
        Ok(())
    }

    pub async fn change_status(
        &self,
        actor: UserId,
        id: JustificationId,
        next: JustificationStatus,
    ) -> WorkflowResult<Justification> {
        let mut justification = self.get(id).await?;
        ensure_transition("justification", justification.status, next)?;

        justification.status = next;
        justification.updated_at = Utc::now();
        self.ctx.store.update_justification(&justification).await?;
        info!(justification_id = id, status = next.label(), "Justification status changed");

        if let Some(request) = self.ctx.store.get_request(justification.request_id).await? {
            self.ctx
                .notifier
                .send_to_user(
                    request.requester_id,
                    format!("Justificación de la solicitud {}", request.folio),
                    format!("La justificación cambió a estado '{}'", next.label()),
                    NotificationCategory::Justification,
                    actor,
                )
                .await;
        }

        Ok(justification)
    }
}
