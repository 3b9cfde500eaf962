use chrono::Utc;
use tracing::info;

use super::{ensure_transition, require_fields, WorkflowContext};
use crate::domain::{
    DocumentId, NotificationCategory, RequestId, SupportingDocument, SupportingDocumentStatus, UserId,
    WorkflowStatus,
};
use crate::error::{WorkflowError, WorkflowResult};

pub const SUPPORTING_DOCUMENT_FOLDER: &str = "documentos";

#[derive(Debug, Clone)]
pub struct NewSupportingDocument {
    pub doc_type: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub uploader_id: UserId,
}

/// Supporting documents attached to a request
#[derive(Clone)]
pub struct SupportingDocuments {
    ctx: WorkflowContext,
}

impl SupportingDocuments {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub async fn attach(&self, request_id: RequestId, doc: NewSupportingDocument) -> WorkflowResult<SupportingDocument> {
        if self.ctx.store.get_request(request_id).await?.is_none() {
            return Err(WorkflowError::not_found("request", request_id));
        }
        require_fields(&[("doc_type", doc.doc_type.as_str()), ("file_name", doc.file_name.as_str())])?;

        let handle = self
            .ctx
            .objects
            .upload(SUPPORTING_DOCUMENT_FOLDER, &doc.file_name, doc.bytes)
            .await?;

        let inserted = self
            .ctx
            .store
            .insert_supporting_document(SupportingDocument {
                id: 0,
                request_id,
                doc_type: doc.doc_type,
                handle: handle.clone(),
                file_name: doc.file_name,
                uploader_id: doc.uploader_id,
                status: SupportingDocumentStatus::Pending,
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

        info!(request_id, document_id = row.id, doc_type = %row.doc_type, "Supporting document attached");
        Ok(row)
    }

    pub async fn get(&self, id: DocumentId) -> WorkflowResult<SupportingDocument> {
        self.ctx
            .store
            .get_supporting_document(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("supporting document", id))
    }

    pub async fn list(&self, request_id: RequestId) -> WorkflowResult<Vec<SupportingDocument>> {
        Ok(self.ctx.store.list_supporting_documents(request_id).await?)
    }

    pub async fn remove(&self, id: DocumentId) -> WorkflowResult<()> {
        let doc = self.get(id).await?;
        self.ctx.discard_blob(&doc.handle).await;
        self.ctx.store.delete_supporting_document(id).await?;
        Ok(())
    }

    pub async fn change_status(
        &self,
        actor: UserId,
        id: DocumentId,
        next: SupportingDocumentStatus,
    ) -> WorkflowResult<SupportingDocument> {
        let mut doc = self.get(id).await?;
        ensure_transition("supporting document", doc.status, next)?;

        doc.status = next;
        self.ctx.store.update_supporting_document(&doc).await?;
        info!(document_id = id, status = next.label(), "Supporting document status changed");

        if let Some(request) = self.ctx.store.get_request(doc.request_id).await? {
            self.ctx
                .notifier
                .send_to_user(
                    request.requester_id,
                    format!("Documento de la solicitud {}", request.folio),
                    format!("El documento '{}' cambió a estado '{}'", doc.file_name, next.label()),
                    NotificationCategory::Document,
                    actor,
                )
                .await;
        }

        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::blobs::MockObjectStore;
    use crate::domain::{BlobHandle, RequestStatus};
    use crate::workflows::test_support::*;

    fn upload() -> NewSupportingDocument {
        NewSupportingDocument {
            doc_type: "cotizacion".to_string(),
            file_name: "cotizacion.pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
            uploader_id: 1,
        }
    }

    #[tokio::test]
    async fn test_attach_requires_request() {
        let fx = fixture().await;
        let docs = SupportingDocuments::new(fx.ctx.clone());
        assert!(matches!(docs.attach(404, upload()).await, Err(WorkflowError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_status_table_and_removal() {
        let fx = fixture().await;
        let request = seed_request(&fx.store, RequestStatus::Pending).await;
        let docs = SupportingDocuments::new(fx.ctx.clone());

        let doc = docs.attach(request.id, upload()).await.unwrap();
        assert_eq!(doc.status, SupportingDocumentStatus::Pending);

        let reviewed = docs.change_status(30, doc.id, SupportingDocumentStatus::Reviewed).await.unwrap();
        assert_eq!(reviewed.status, SupportingDocumentStatus::Reviewed);
        assert!(matches!(
            docs.change_status(30, doc.id, SupportingDocumentStatus::Active).await,
            Err(WorkflowError::InvalidTransition { .. })
        ));

        docs.remove(doc.id).await.unwrap();
        assert!(docs.list(request.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_row_deletes_uploaded_blob() {
        let fx = fixture().await;
        let request = seed_request(&fx.store, RequestStatus::Pending).await;

        let mut objects = MockObjectStore::new();
        objects
            .expect_upload()
            .times(1)
            .returning(|folder, name, _| Ok(BlobHandle(format!("{folder}/{name}"))));
        objects
            .expect_delete()
            .withf(|handle| handle.as_str() == "documentos/cotizacion.pdf")
            .times(1)
            .returning(|_| Ok(()));
        let docs = SupportingDocuments::new(WorkflowContext::new(fx.store.clone(), Arc::new(objects)));

        fx.store.reject_document_inserts(true);
        let result = docs.attach(request.id, upload()).await;
        assert!(matches!(result, Err(WorkflowError::Store(_))), "{result:?}");
        assert!(docs.list(request.id).await.unwrap().is_empty());
    }
}
