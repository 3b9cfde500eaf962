use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BlobHandle, DepartmentId, DocumentId, RequestId, SufficiencyId, UserId, WorkflowStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SufficiencyKind {
    #[serde(rename = "pre-suficiencia")]
    PreSufficiency,
    #[serde(rename = "suficiencia")]
    Sufficiency,
}

impl SufficiencyKind {
    pub fn label(&self) -> &'static str {
        match self {
            SufficiencyKind::PreSufficiency => "pre-suficiencia",
            SufficiencyKind::Sufficiency => "suficiencia",
        }
    }

    /// Object-store folder the response documents of this kind live in
    pub fn storage_folder(&self) -> &'static str {
        match self {
            SufficiencyKind::PreSufficiency => "pre-suficiencias",
            SufficiencyKind::Sufficiency => "suficiencias",
        }
    }
}

impl std::str::FromStr for SufficiencyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre-suficiencia" | "pre-sufficiency" | "presuficiencia" => Ok(SufficiencyKind::PreSufficiency),
            "suficiencia" | "sufficiency" => Ok(SufficiencyKind::Sufficiency),
            other => Err(format!("unknown sufficiency kind '{other}'")),
        }
    }
}

/// Ordered Pendiente < Enviado para atender < Atendido
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SufficiencyStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "Enviado para atender")]
    Sent,
    #[serde(rename = "Atendido")]
    Addressed,
}

impl WorkflowStatus for SufficiencyStatus {
    fn label(&self) -> &'static str {
        match self {
            SufficiencyStatus::Pending => "Pendiente",
            SufficiencyStatus::Sent => "Enviado para atender",
            SufficiencyStatus::Addressed => "Atendido",
        }
    }

    // Addressed is entered by `mark_addressed` from any status, outside the table.
    fn successors(&self) -> &'static [Self] {
        match self {
            SufficiencyStatus::Pending => &[SufficiencyStatus::Sent],
            SufficiencyStatus::Sent | SufficiencyStatus::Addressed => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSufficiencyRequest {
    pub id: SufficiencyId,
    pub request_id: RequestId,
    pub kind: SufficiencyKind,
    pub secretariat_id: u64,
    pub department_id: DepartmentId,
    pub user_id: UserId,
    pub office_letter_number: String,
    pub subject: String,
    pub place: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub account: String,
    pub amount: Decimal,
    pub motive: String,
    pub status: SufficiencyStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response document uploaded by the budget office
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyDocument {
    pub id: DocumentId,
    pub sufficiency_id: SufficiencyId,
    pub handle: BlobHandle,
    pub file_name: String,
    pub uploader_id: UserId,
    pub uploaded_at: DateTime<Utc>,
}
