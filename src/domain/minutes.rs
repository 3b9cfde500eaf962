use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgendaId, MinutesId, UserId, WorkflowStatus};

/// Status of the session minutes ("acta")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinutesStatus {
    #[serde(rename = "Borrador")]
    Draft,
    #[serde(rename = "En firmas")]
    Signing,
    #[serde(rename = "Cerrada")]
    Closed,
    #[serde(rename = "Cancelada")]
    Cancelled,
}

impl WorkflowStatus for MinutesStatus {
    fn label(&self) -> &'static str {
        match self {
            MinutesStatus::Draft => "Borrador",
            MinutesStatus::Signing => "En firmas",
            MinutesStatus::Closed => "Cerrada",
            MinutesStatus::Cancelled => "Cancelada",
        }
    }

    fn successors(&self) -> &'static [Self] {
        use MinutesStatus::*;
        match self {
            Draft => &[Signing, Cancelled],
            Signing => &[Closed, Cancelled],
            Closed | Cancelled => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeRoster {
    Base,
    Invited,
    RequestingArea,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minutes {
    pub id: MinutesId,
    pub agenda_id: AgendaId,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub close_time: Option<NaiveTime>,
    pub points_treated: Vec<String>,
    pub other_business: String,
    pub status: MinutesStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Roster snapshot row with signature and correction state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinutesAttendee {
    pub minutes_id: MinutesId,
    pub user_id: UserId,
    pub roster: AttendeeRoster,
    pub signed_at: Option<DateTime<Utc>>,
    pub correction_comment: Option<String>,
    pub correction_requested_at: Option<DateTime<Utc>>,
}

impl MinutesAttendee {
    pub fn new(minutes_id: MinutesId, user_id: UserId, roster: AttendeeRoster) -> Self {
        Self {
            minutes_id,
            user_id,
            roster,
            signed_at: None,
            correction_comment: None,
            correction_requested_at: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signed_at.is_some()
    }
}
