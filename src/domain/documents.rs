use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DocumentId, RequestId, UserId, WorkflowStatus};

/// Opaque reference to an object in the attachment store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(pub String);

impl BlobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportingDocumentStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "Activo")]
    Active,
    #[serde(rename = "Revisado")]
    Reviewed,
}

impl WorkflowStatus for SupportingDocumentStatus {
    fn label(&self) -> &'static str {
        match self {
            SupportingDocumentStatus::Pending => "Pendiente",
            SupportingDocumentStatus::Active => "Activo",
            SupportingDocumentStatus::Reviewed => "Revisado",
        }
    }

    fn successors(&self) -> &'static [Self] {
        use SupportingDocumentStatus::*;
        match self {
            Pending => &[Active, Reviewed],
            Active => &[Reviewed],
            Reviewed => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingDocument {
    pub id: DocumentId,
    pub request_id: RequestId,
    pub doc_type: String,
    pub handle: BlobHandle,
    pub file_name: String,
    pub uploader_id: UserId,
    pub status: SupportingDocumentStatus,
    pub uploaded_at: DateTime<Utc>,
}

/// Blob whose delete failed and is waiting for the reconciler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBlobDeletion {
    pub id: u64,
    pub handle: BlobHandle,
    pub attempts: u32,
    pub last_error: String,
    pub created_at: DateTime<Utc>,
}
