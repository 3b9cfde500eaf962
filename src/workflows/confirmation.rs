use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::WorkflowContext;
use crate::domain::{Agenda, AgendaId, AgendaParticipant, Roster, UserId};
use crate::error::{WorkflowError, WorkflowResult};

/// Participant row joined with the user's display data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantView {
    pub user_id: UserId,
    pub name: String,
    pub title: String,
    pub roster: Roster,
    pub seen_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub observations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterView {
    pub agenda_id: AgendaId,
    pub base: Vec<ParticipantView>,
    pub invited: Vec<ParticipantView>,
    pub has_confirmed_participant: bool,
}

/// An agenda as seen by one of its participants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAgenda {
    pub agenda: Agenda,
    pub participation: AgendaParticipant,
}

/// Per-participant seen/confirmed tracking.
///
/// Both marks are first-write-wins: repeating them never moves the
/// timestamp.
#[derive(Clone)]
pub struct ParticipantConfirmationTracker {
    ctx: WorkflowContext,
}

impl ParticipantConfirmationTracker {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    async fn participant(&self, agenda_id: AgendaId, user_id: UserId) -> WorkflowResult<AgendaParticipant> {
        self.ctx
            .store
            .get_participant(agenda_id, user_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("agenda participant", format!("{agenda_id}/{user_id}")))
    }

    pub async fn mark_seen(&self, agenda_id: AgendaId, user_id: UserId) -> WorkflowResult<AgendaParticipant> {
        let mut participant = self.participant(agenda_id, user_id).await?;
        if participant.seen_at.is_some() {
            debug!(agenda_id, user_id, "Agenda already marked as seen");
            return Ok(participant);
        }

        participant.seen_at = Some(Utc::now());
        self.ctx.store.upsert_participant(&participant).await?;
        Ok(participant)
    }

    pub async fn mark_confirmed(
        &self,
        agenda_id: AgendaId,
        user_id: UserId,
        observations: Option<String>,
    ) -> WorkflowResult<AgendaParticipant> {
        let mut participant = self.participant(agenda_id, user_id).await?;
        if participant.confirmed_at.is_some() {
            debug!(agenda_id, user_id, "Attendance already confirmed");
            return Ok(participant);
        }

        participant.confirmed_at = Some(Utc::now());
        participant.observations = observations.filter(|o| !o.trim().is_empty());
        self.ctx.store.upsert_participant(&participant).await?;

        info!(agenda_id, user_id, "Attendance confirmed");
        Ok(participant)
    }

    /// Participants split by roster, each with the user's name and title
    pub async fn roster(&self, agenda_id: AgendaId) -> WorkflowResult<RosterView> {
        if self.ctx.store.get_agenda(agenda_id).await?.is_none() {
            return Err(WorkflowError::not_found("agenda", agenda_id));
        }

        let mut view = RosterView {
            agenda_id,
            base: Vec::new(),
            invited: Vec::new(),
            has_confirmed_participant: false,
        };

        for participant in self.ctx.store.list_participants(agenda_id).await? {
            let user = self.ctx.store.get_user(participant.user_id).await?;
            let (name, title) = user.map(|u| (u.name, u.title)).unwrap_or_default();
            view.has_confirmed_participant |= participant.confirmed_at.is_some();

            let entry = ParticipantView {
                user_id: participant.user_id,
                name,
                title,
                roster: participant.roster,
                seen_at: participant.seen_at,
                confirmed_at: participant.confirmed_at,
                observations: participant.observations,
            };
            match participant.roster {
                Roster::Base => view.base.push(entry),
                Roster::Invited => view.invited.push(entry),
            }
        }

        Ok(view)
    }

    pub async fn has_confirmed_participant(&self, agenda_id: AgendaId) -> WorkflowResult<bool> {
        let participants = self.ctx.store.list_participants(agenda_id).await?;
        Ok(participants.iter().any(|p| p.confirmed_at.is_some()))
    }

    /// Every agenda the user is rostered on, with their own confirmation state
    pub async fn agendas_for_user(&self, user_id: UserId) -> WorkflowResult<Vec<UserAgenda>> {
        let mut agendas = Vec::new();
        for participation in self.ctx.store.list_participations(user_id).await? {
            if let Some(agenda) = self.ctx.store.get_agenda(participation.agenda_id).await? {
                agendas.push(UserAgenda { agenda, participation });
            }
        }
        agendas.sort_by(|a, b| (a.agenda.event_date, a.agenda.hour).cmp(&(b.agenda.event_date, b.agenda.hour)));
        Ok(agendas)
    }
}
