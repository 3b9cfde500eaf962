use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgendaId, RequestId, UserId, WorkflowStatus};

/// Status of a committee agenda ("orden del día")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgendaStatus {
    /// Persisted but rosters/notifications not yet complete
    #[serde(rename = "Provisional")]
    Provisional,
    #[serde(rename = "Convocada")]
    Convened,
    #[serde(rename = "En sesión")]
    InSession,
    #[serde(rename = "Cancelada")]
    Cancelled,
    #[serde(rename = "Terminada")]
    Finished,
}

impl WorkflowStatus for AgendaStatus {
    fn label(&self) -> &'static str {
        match self {
            AgendaStatus::Provisional => "Provisional",
            AgendaStatus::Convened => "Convocada",
            AgendaStatus::InSession => "En sesión",
            AgendaStatus::Cancelled => "Cancelada",
            AgendaStatus::Finished => "Terminada",
        }
    }

    fn successors(&self) -> &'static [Self] {
        use AgendaStatus::*;
        match self {
            Provisional => &[Convened, Cancelled],
            Convened => &[InSession, Cancelled, Finished],
            InSession => &[Finished, Cancelled],
            Cancelled | Finished => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgendaSubject {
    #[serde(rename = "Convocatoria")]
    Convocation,
    #[serde(rename = "Cancelación")]
    Cancellation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Roster {
    Base,
    Invited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agenda {
    pub id: AgendaId,
    pub request_id: RequestId,
    pub event_date: NaiveDate,
    pub hour: NaiveTime,
    pub office_letter_number: String,
    pub subject: AgendaSubject,
    pub points: Vec<String>,
    pub status: AgendaStatus,
    pub base_roster: Vec<UserId>,
    pub invited_roster: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agenda {
    /// Every rostered user, base first, without duplicates
    pub fn roster_entries(&self) -> Vec<(UserId, Roster)> {
        let mut entries: Vec<(UserId, Roster)> = Vec::new();
        let rosters = [(&self.base_roster, Roster::Base), (&self.invited_roster, Roster::Invited)];
        for (ids, roster) in rosters {
            for id in ids {
                if !entries.iter().any(|(seen, _)| seen == id) {
                    entries.push((*id, roster));
                }
            }
        }
        entries
    }
}

/// Per-user confirmation row scoped to one agenda
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaParticipant {
    pub agenda_id: AgendaId,
    pub user_id: UserId,
    pub roster: Roster,
    pub seen_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub observations: Option<String>,
}

impl AgendaParticipant {
    pub fn new(agenda_id: AgendaId, user_id: UserId, roster: Roster) -> Self {
        Self {
            agenda_id,
            user_id,
            roster,
            seen_at: None,
            confirmed_at: None,
            observations: None,
        }
    }
}
