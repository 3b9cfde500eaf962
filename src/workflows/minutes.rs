use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::{ensure_transition, WorkflowContext};
use crate::domain::{
    AgendaId, AgendaStatus, AttendeeRoster, Minutes, MinutesAttendee, MinutesId, MinutesStatus, NotificationCategory, Roster,
    UserId, WorkflowStatus,
};
use crate::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewMinutes {
    pub agenda_id: AgendaId,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    #[serde(default)]
    pub close_time: Option<NaiveTime>,
    pub points_treated: Vec<String>,
    #[serde(default)]
    pub other_business: String,
    /// Extra attendees from the requesting area
    #[serde(default)]
    pub requesting_area: Vec<UserId>,
}

/// What an attendee does with the minutes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendeeAction {
    Sign,
    RequestCorrection { comment: String },
}

impl AttendeeAction {
    /// A comment means a correction request; no comment means a signature
    pub fn from_comment(comment: Option<String>) -> Self {
        match comment {
            Some(comment) => AttendeeAction::RequestCorrection { comment },
            None => AttendeeAction::Sign,
        }
    }
}

#[derive(Clone)]
pub struct MinutesWorkflow {
    ctx: WorkflowContext,
}

impl MinutesWorkflow {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, actor: UserId, new: NewMinutes) -> WorkflowResult<(Minutes, Vec<MinutesAttendee>)> {
        let store = &self.ctx.store;
        let agenda = store
            .get_agenda(new.agenda_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("agenda", new.agenda_id))?;
        // Only a session that was actually convened gets minutes
        if matches!(agenda.status, AgendaStatus::Provisional | AgendaStatus::Cancelled) {
            return Err(WorkflowError::Validation(format!(
                "agenda {} is '{}' and cannot have minutes",
                agenda.id,
                agenda.status.label()
            )));
        }
        if let Some(existing) = store.get_minutes_by_agenda(agenda.id).await? {
            return Err(WorkflowError::AlreadyExists {
                entity: "minutes",
                scope: format!("agenda {} (minutes {})", agenda.id, existing.id),
            });
        }
        if new.points_treated.iter().all(|p| p.trim().is_empty()) {
            return Err(WorkflowError::Validation("minutes need at least one treated point".to_string()));
        }

        let mut roster: Vec<(UserId, AttendeeRoster)> = Vec::new();
        let agenda_entries = agenda.roster_entries().into_iter().map(|(id, r)| {
            let roster = match r {
                Roster::Base => AttendeeRoster::Base,
                Roster::Invited => AttendeeRoster::Invited,
            };
            (id, roster)
        });
        let area_entries = new.requesting_area.iter().map(|id| (*id, AttendeeRoster::RequestingArea));
        for (user_id, kind) in agenda_entries.chain(area_entries) {
            if !roster.iter().any(|(seen, _)| *seen == user_id) {
                roster.push((user_id, kind));
            }
        }
        if roster.is_empty() {
            return Err(WorkflowError::Validation("minutes need at least one attendee".to_string()));
        }

        let now = Utc::now();
        let minutes = store
            .insert_minutes(Minutes {
                id: 0,
                agenda_id: agenda.id,
                session_date: new.session_date,
                start_time: new.start_time,
                close_time: new.close_time,
                points_treated: new.points_treated,
                other_business: new.other_business,
                status: MinutesStatus::Draft,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let mut attendees = Vec::with_capacity(roster.len());
        for (user_id, kind) in roster {
            let attendee = MinutesAttendee::new(minutes.id, user_id, kind);
            store.upsert_attendee(&attendee).await?;
            attendees.push(attendee);
        }

        for attendee in &attendees {
            self.ctx
                .notifier
                .send_to_user(
                    attendee.user_id,
                    format!("Acta de la sesión {}", agenda.office_letter_number),
                    format!(
                        "El acta de la sesión del {} está pendiente de tu firma",
                        minutes.session_date.format("%d/%m/%Y")
                    ),
                    NotificationCategory::Minutes,
                    actor,
                )
                .await;
        }

        info!(minutes_id = minutes.id, agenda_id = agenda.id, attendees = attendees.len(), "Minutes created");
        Ok((minutes, attendees))
    }

    pub async fn get(&self, id: MinutesId) -> WorkflowResult<Minutes> {
        self.ctx
            .store
            .get_minutes(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("minutes", id))
    }

    pub async fn get_by_agenda(&self, agenda_id: AgendaId) -> WorkflowResult<Minutes> {
        self.ctx
            .store
            .get_minutes_by_agenda(agenda_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("minutes for agenda", agenda_id))
    }

    pub async fn attendees(&self, id: MinutesId) -> WorkflowResult<Vec<MinutesAttendee>> {
        Ok(self.ctx.store.list_attendees(id).await?)
    }

    async fn attendee(&self, minutes: &Minutes, user_id: UserId) -> WorkflowResult<MinutesAttendee> {
        self.ctx
            .store
            .get_attendee(minutes.id, user_id)
            .await?
            .ok_or(WorkflowError::AttendeeNotFound {
                minutes_id: minutes.id,
                user_id,
            })
    }

    fn ensure_open(minutes: &Minutes) -> WorkflowResult<()> {
        if minutes.status.is_terminal() {
            return Err(WorkflowError::MinutesClosed {
                minutes_id: minutes.id,
                status: minutes.status.label(),
            });
        }
        Ok(())
    }

    pub async fn sign(&self, id: MinutesId, user_id: UserId) -> WorkflowResult<MinutesAttendee> {
        let minutes = self.get(id).await?;
        let mut attendee = self.attendee(&minutes, user_id).await?;
        Self::ensure_open(&minutes)?;
        if attendee.is_signed() {
            return Err(WorkflowError::AlreadySigned { minutes_id: id, user_id });
        }

        attendee.signed_at = Some(Utc::now());
        self.ctx.store.upsert_attendee(&attendee).await?;
        info!(minutes_id = id, user_id, "Minutes signed");
        Ok(attendee)
    }

    pub async fn request_correction(&self, id: MinutesId, user_id: UserId, comment: String) -> WorkflowResult<MinutesAttendee> {
        let minutes = self.get(id).await?;
        let mut attendee = self.attendee(&minutes, user_id).await?;
        if attendee.is_signed() {
            return Err(WorkflowError::AlreadySigned { minutes_id: id, user_id });
        }
        Self::ensure_open(&minutes)?;
        if comment.trim().is_empty() {
            return Err(WorkflowError::Validation("correction comment must not be empty".to_string()));
        }

        attendee.correction_comment = Some(comment);
        attendee.correction_requested_at = Some(Utc::now());
        self.ctx.store.upsert_attendee(&attendee).await?;
        info!(minutes_id = id, user_id, "Minutes correction requested");
        Ok(attendee)
    }

    /// Single entry point for attendees: sign, or ask for a correction
    pub async fn respond(&self, id: MinutesId, user_id: UserId, action: AttendeeAction) -> WorkflowResult<MinutesAttendee> {
        match action {
            AttendeeAction::Sign => self.sign(id, user_id).await,
            AttendeeAction::RequestCorrection { comment } => self.request_correction(id, user_id, comment).await,
        }
    }

    pub async fn set_status(&self, id: MinutesId, next: MinutesStatus) -> WorkflowResult<Minutes> {
        let mut minutes = self.get(id).await?;
        ensure_transition("minutes", minutes.status, next)?;

        minutes.status = next;
        minutes.updated_at = Utc::now();
        self.ctx.store.update_minutes(&minutes).await?;
        info!(minutes_id = id, status = next.label(), "Minutes status changed");
        Ok(minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Agenda, AgendaSubject, RequestStatus};
    use crate::store::{AgendaStore, MinutesStore, NotificationStore};
    use crate::workflows::test_support::*;
    use crate::workflows::{CommitteeAgendaScheduler, NewAgenda};

    async fn agenda_id(fx: &Fixture) -> AgendaId {
        let request = seed_request(&fx.store, RequestStatus::Approved).await;
        CommitteeAgendaScheduler::new(fx.ctx.clone())
            .create(
                30,
                NewAgenda {
                    request_id: request.id,
                    event_date: date(),
                    hour: time(),
                    office_letter_number: "OF-COM-2".to_string(),
                    subject: AgendaSubject::Convocation,
                    points: vec![],
                    base_roster: vec![10, 11],
                    invited_roster: vec![20],
                },
            )
            .await
            .unwrap()
            .id
    }

    fn new_minutes(agenda_id: AgendaId, requesting_area: Vec<UserId>) -> NewMinutes {
        NewMinutes {
            agenda_id,
            session_date: date(),
            start_time: time(),
            close_time: None,
            points_treated: vec!["Aprobación del dictamen".to_string()],
            other_business: String::new(),
            requesting_area,
        }
    }

    #[tokio::test]
    async fn test_attendees_are_deduplicated_first_roster_wins() {
        let fx = fixture().await;
        let agenda_id = agenda_id(&fx).await;
        let workflow = MinutesWorkflow::new(fx.ctx.clone());

        let (_, attendees) = workflow.create(30, new_minutes(agenda_id, vec![20, 1])).await.unwrap();
        let rosters: Vec<(UserId, AttendeeRoster)> = attendees.iter().map(|a| (a.user_id, a.roster)).collect();
        assert_eq!(
            rosters,
            vec![
                (10, AttendeeRoster::Base),
                (11, AttendeeRoster::Base),
                (20, AttendeeRoster::Invited),
                (1, AttendeeRoster::RequestingArea),
            ]
        );

        let minutes_notices = fx
            .store
            .list_notifications()
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.category == NotificationCategory::Minutes)
            .count();
        assert_eq!(minutes_notices, 4);
    }

    #[tokio::test]
    async fn test_minutes_need_a_convened_agenda() {
        let fx = fixture().await;
        let workflow = MinutesWorkflow::new(fx.ctx.clone());

        let cancelled = agenda_id(&fx).await;
        let mut agenda = fx.store.get_agenda(cancelled).await.unwrap().unwrap();
        agenda.status = AgendaStatus::Cancelled;
        fx.store.update_agenda(&agenda).await.unwrap();

        let err = workflow.create(30, new_minutes(cancelled, vec![])).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)), "{err:?}");

        // Left provisional by an interrupted creation
        let now = Utc::now();
        let provisional = fx
            .store
            .insert_agenda(Agenda {
                id: 0,
                request_id: agenda.request_id,
                event_date: date(),
                hour: time(),
                office_letter_number: "OF-COM-3".to_string(),
                subject: AgendaSubject::Convocation,
                points: vec![],
                status: AgendaStatus::Provisional,
                base_roster: vec![10],
                invited_roster: vec![],
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let err = workflow.create(30, new_minutes(provisional.id, vec![])).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)), "{err:?}");

        assert!(fx.store.get_minutes_by_agenda(cancelled).await.unwrap().is_none());
        assert!(fx.store.get_minutes_by_agenda(provisional.id).await.unwrap().is_none());
        let minutes_notices = fx
            .store
            .list_notifications()
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.category == NotificationCategory::Minutes)
            .count();
        assert_eq!(minutes_notices, 0);
    }

    #[tokio::test]
    async fn test_one_minutes_per_agenda() {
        let fx = fixture().await;
        let agenda_id = agenda_id(&fx).await;
        let workflow = MinutesWorkflow::new(fx.ctx.clone());

        workflow.create(30, new_minutes(agenda_id, vec![])).await.unwrap();
        assert!(matches!(
            workflow.create(30, new_minutes(agenda_id, vec![])).await,
            Err(WorkflowError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_signature_rules() {
        let fx = fixture().await;
        let agenda_id = agenda_id(&fx).await;
        let workflow = MinutesWorkflow::new(fx.ctx.clone());
        let (minutes, _) = workflow.create(30, new_minutes(agenda_id, vec![])).await.unwrap();

        assert!(matches!(
            workflow.sign(minutes.id, 99).await,
            Err(WorkflowError::AttendeeNotFound { .. })
        ));

        workflow.respond(minutes.id, 10, AttendeeAction::from_comment(None)).await.unwrap();
        assert!(matches!(
            workflow.sign(minutes.id, 10).await,
            Err(WorkflowError::AlreadySigned { .. })
        ));
        assert!(matches!(
            workflow
                .respond(minutes.id, 10, AttendeeAction::from_comment(Some("x".to_string())))
                .await,
            Err(WorkflowError::AlreadySigned { .. })
        ));

        let corrected = workflow
            .respond(minutes.id, 11, AttendeeAction::from_comment(Some("Falta un punto".to_string())))
            .await
            .unwrap();
        assert_eq!(corrected.correction_comment.as_deref(), Some("Falta un punto"));
        assert!(corrected.correction_requested_at.is_some());
        assert!(!corrected.is_signed());
    }

    #[tokio::test]
    async fn test_terminal_minutes_reject_signatures() {
        let fx = fixture().await;
        let agenda_id = agenda_id(&fx).await;
        let workflow = MinutesWorkflow::new(fx.ctx.clone());
        let (minutes, _) = workflow.create(30, new_minutes(agenda_id, vec![])).await.unwrap();

        workflow.set_status(minutes.id, MinutesStatus::Cancelled).await.unwrap();
        assert!(matches!(
            workflow.sign(minutes.id, 10).await,
            Err(WorkflowError::MinutesClosed { .. })
        ));
        assert!(matches!(
            workflow.request_correction(minutes.id, 11, "x".to_string()).await,
            Err(WorkflowError::MinutesClosed { .. })
        ));
    }
}
