use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{BlobHandle, DocumentId, JustificationId, RequestId, UserId, WorkflowStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JustificationStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "En revisión")]
    UnderReview,
    #[serde(rename = "Aprobada")]
    Approved,
    #[serde(rename = "Rechazada")]
    Rejected,
}

impl WorkflowStatus for JustificationStatus {
    fn label(&self) -> &'static str {
        match self {
            JustificationStatus::Pending => "Pendiente",
            JustificationStatus::UnderReview => "En revisión",
            JustificationStatus::Approved => "Aprobada",
            JustificationStatus::Rejected => "Rechazada",
        }
    }

    fn successors(&self) -> &'static [Self] {
        use JustificationStatus::*;
        match self {
            Pending => &[UnderReview],
            UnderReview => &[Approved, Rejected],
            Rejected => &[UnderReview],
            Approved => &[],
        }
    }
}

impl JustificationStatus {
    pub fn allows_edits(&self) -> bool {
        !matches!(self, JustificationStatus::UnderReview | JustificationStatus::Approved)
    }
}

/// Header of the official letter ("oficio") a record is filed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeLetter {
    pub number: String,
    pub date: NaiveDate,
    pub addressee: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Justification {
    pub id: JustificationId,
    pub request_id: RequestId,
    pub office_letter: OfficeLetter,
    pub legal_grounds: String,
    pub need: String,
    pub consequences: String,
    pub status: JustificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Evidence attached to a justification section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JustificationDocument {
    pub id: DocumentId,
    pub justification_id: JustificationId,
    pub section: String,
    pub handle: BlobHandle,
    pub file_name: String,
    pub uploader_id: UserId,
    pub comment: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}
