use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{DepartmentId, RequestId, UserId, WorkflowStatus};

/// Lifecycle of a procurement request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "En revisión")]
    UnderReview,
    #[serde(rename = "Aprobada")]
    Approved,
    #[serde(rename = "Rechazada")]
    Rejected,
    #[serde(rename = "Cancelada")]
    Cancelled,
    #[serde(rename = "En comite")]
    InCommittee,
    #[serde(rename = "En concurso")]
    InContest,
    #[serde(rename = "Cerrada")]
    Closed,
}

impl WorkflowStatus for RequestStatus {
    fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pendiente",
            RequestStatus::UnderReview => "En revisión",
            RequestStatus::Approved => "Aprobada",
            RequestStatus::Rejected => "Rechazada",
            RequestStatus::Cancelled => "Cancelada",
            RequestStatus::InCommittee => "En comite",
            RequestStatus::InContest => "En concurso",
            RequestStatus::Closed => "Cerrada",
        }
    }

    fn successors(&self) -> &'static [Self] {
        use RequestStatus::*;
        match self {
            Pending => &[UnderReview, Cancelled],
            UnderReview => &[Approved, Rejected, Cancelled],
            Rejected => &[UnderReview, Cancelled],
            Approved => &[InCommittee, Cancelled],
            InCommittee => &[InContest, Cancelled],
            InContest => &[Closed, Cancelled],
            Cancelled | Closed => &[],
        }
    }
}

impl RequestStatus {
    /// Requests under review or already approved are frozen for edits
    pub fn allows_edits(&self) -> bool {
        !matches!(self, RequestStatus::UnderReview | RequestStatus::Approved)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse listing buckets used by the committee dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    InCommittee,
    InContest,
}

impl StatusBucket {
    pub fn contains(&self, status: RequestStatus) -> bool {
        match self {
            StatusBucket::InCommittee => status == RequestStatus::InCommittee,
            StatusBucket::InContest => status == RequestStatus::InContest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub folio: String,
    pub requester_id: UserId,
    pub department_id: DepartmentId,
    pub amount: Decimal,
    pub acquisition_type_id: u64,
    pub motive: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [RequestStatus; 8] = [
        RequestStatus::Pending,
        RequestStatus::UnderReview,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Cancelled,
        RequestStatus::InCommittee,
        RequestStatus::InContest,
        RequestStatus::Closed,
    ];

    #[test]
    fn test_happy_path_is_reachable() {
        let path = [
            RequestStatus::Pending,
            RequestStatus::UnderReview,
            RequestStatus::Approved,
            RequestStatus::InCommittee,
            RequestStatus::InContest,
            RequestStatus::Closed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_pending_cannot_skip_review() {
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::Approved));
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::InCommittee));
    }

    #[test]
    fn test_edit_gate() {
        assert!(RequestStatus::Pending.allows_edits());
        assert!(RequestStatus::Rejected.allows_edits());
        assert!(!RequestStatus::UnderReview.allows_edits());
        assert!(!RequestStatus::Approved.allows_edits());
    }

    #[test]
    fn test_labels_match_serde_names() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.label()));
        }
    }

    proptest! {
        #[test]
        fn terminal_statuses_never_move(from in 0usize..8, to in 0usize..8) {
            let from = ALL[from];
            let to = ALL[to];
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
        }

        #[test]
        fn no_status_transitions_to_itself(idx in 0usize..8) {
            let status = ALL[idx];
            prop_assert!(!status.can_transition_to(status));
        }
    }
}
