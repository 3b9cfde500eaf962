//! Committee agenda scheduling
//!
//! Creating an agenda touches the agenda row, one participant row per
//! rostered user, one notification per participant and the owning request.
//! The store offers no transaction across those, so creation runs as a saga:
//!
//! 1. persist the agenda as `Provisional`
//! 2. insert the missing participant rows
//! 3. queue one notification per newly inserted participant
//! 4. flip the agenda to `Convened`
//! 5. move the request to `InCommittee`
//!
//! A crash anywhere before step 4 leaves a provisional agenda behind, and
//! [`CommitteeAgendaScheduler::recover_provisional`] replays steps 2-5 for it.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::{ensure_transition, require_fields, RequestLifecycle, WorkflowContext};
use crate::domain::{
    Agenda, AgendaId, AgendaParticipant, AgendaStatus, AgendaSubject, NotificationCategory, RequestId,
    RequestStatus, UserId, WorkflowStatus,
};
use crate::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgenda {
    pub request_id: RequestId,
    pub event_date: NaiveDate,
    pub hour: NaiveTime,
    pub office_letter_number: String,
    pub subject: AgendaSubject,
    #[serde(default)]
    pub points: Vec<String>,
    #[serde(default)]
    pub base_roster: Vec<UserId>,
    #[serde(default)]
    pub invited_roster: Vec<UserId>,
}

/// The two mutually exclusive ways an agenda can be edited
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AgendaUpdate {
    /// Scheduling details only; rosters are left alone
    GeneralInfo {
        event_date: NaiveDate,
        hour: NaiveTime,
        office_letter_number: String,
        subject: AgendaSubject,
    },
    /// Replace the points and rebuild every participant row
    PointsAndRoster {
        points: Vec<String>,
        base_roster: Vec<UserId>,
        invited_roster: Vec<UserId>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub completed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct CommitteeAgendaScheduler {
    ctx: WorkflowContext,
    requests: RequestLifecycle,
}

impl CommitteeAgendaScheduler {
    pub fn new(ctx: WorkflowContext) -> Self {
        let requests = RequestLifecycle::new(ctx.clone());
        Self { ctx, requests }
    }

    pub async fn create(&self, actor: UserId, new: NewAgenda) -> WorkflowResult<Agenda> {
        let request = self.requests.get(new.request_id).await?;
        if request.status != RequestStatus::InCommittee {
            ensure_transition("request", request.status, RequestStatus::InCommittee)?;
        }
        if let Some(active) = self.active_agenda(new.request_id).await? {
            return Err(WorkflowError::ActiveAgendaExists {
                request_id: new.request_id,
                agenda_id: active.id,
            });
        }
        require_fields(&[("office_letter_number", new.office_letter_number.as_str())])?;

        let now = Utc::now();
        let agenda = self
            .ctx
            .store
            .insert_agenda(Agenda {
                id: 0,
                request_id: new.request_id,
                event_date: new.event_date,
                hour: new.hour,
                office_letter_number: new.office_letter_number,
                subject: new.subject,
                points: new.points,
                status: AgendaStatus::Provisional,
                base_roster: new.base_roster,
                invited_roster: new.invited_roster,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(agenda_id = agenda.id, request_id = agenda.request_id, "Provisional agenda persisted");
        self.complete(actor, agenda).await
    }

    /// Saga steps 2-5; safe to replay on a partially completed agenda
    async fn complete(&self, actor: UserId, mut agenda: Agenda) -> WorkflowResult<Agenda> {
        let mut inserted = Vec::new();
        for (user_id, roster) in agenda.roster_entries() {
            if self.ctx.store.get_participant(agenda.id, user_id).await?.is_none() {
                self.ctx
                    .store
                    .upsert_participant(&AgendaParticipant::new(agenda.id, user_id, roster))
                    .await?;
                inserted.push(user_id);
            }
        }

        for user_id in &inserted {
            self.notify_convocation(actor, &agenda, *user_id).await;
        }

        agenda.status = AgendaStatus::Convened;
        agenda.updated_at = Utc::now();
        self.ctx.store.update_agenda(&agenda).await?;

        let request = self.requests.get(agenda.request_id).await?;
        if request.status != RequestStatus::InCommittee {
            self.requests
                .transition_silently(agenda.request_id, RequestStatus::InCommittee)
                .await?;
        }

        info!(
            agenda_id = agenda.id,
            participants = inserted.len(),
            "Agenda convened"
        );
        Ok(agenda)
    }

    async fn notify_convocation(&self, actor: UserId, agenda: &Agenda, user_id: UserId) {
        self.ctx
            .notifier
            .send_to_user(
                user_id,
                format!("Convocatoria a sesión de comité ({})", agenda.office_letter_number),
                format!(
                    "Se te convoca a la sesión del {} a las {}",
                    agenda.event_date.format("%d/%m/%Y"),
                    agenda.hour.format("%H:%M")
                ),
                NotificationCategory::Agenda,
                actor,
            )
            .await;
    }

    /// Finish every agenda a crash left in `Provisional`
    pub async fn recover_provisional(&self, actor: UserId) -> WorkflowResult<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let provisional: Vec<Agenda> = self
            .ctx
            .store
            .list_agendas()
            .await?
            .into_iter()
            .filter(|a| a.status == AgendaStatus::Provisional)
            .collect();

        for agenda in provisional {
            let agenda_id = agenda.id;
            match self.complete(actor, agenda).await {
                Ok(_) => report.completed += 1,
                Err(e) => {
                    warn!(agenda_id, error = %e, "Failed to recover provisional agenda");
                    report.failed += 1;
                }
            }
        }

        if report.completed + report.failed > 0 {
            info!(completed = report.completed, failed = report.failed, "Agenda recovery finished");
        }
        Ok(report)
    }

    pub async fn get(&self, id: AgendaId) -> WorkflowResult<Agenda> {
        self.ctx
            .store
            .get_agenda(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("agenda", id))
    }

    pub async fn list(&self) -> WorkflowResult<Vec<Agenda>> {
        Ok(self.ctx.store.list_agendas().await?)
    }

    async fn active_agenda(&self, request_id: RequestId) -> WorkflowResult<Option<Agenda>> {
        let agendas = self.ctx.store.list_agendas_for_request(request_id).await?;
        Ok(agendas.into_iter().find(|a| !a.status.is_terminal()))
    }

    /// The request's live agenda, or its most recent one when all are closed
    pub async fn current_for_request(&self, request_id: RequestId) -> WorkflowResult<Agenda> {
        if let Some(active) = self.active_agenda(request_id).await? {
            return Ok(active);
        }
        self.ctx
            .store
            .list_agendas_for_request(request_id)
            .await?
            .into_iter()
            .max_by_key(|a| a.id)
            .ok_or_else(|| WorkflowError::not_found("agenda for request", request_id))
    }

    pub async fn update(&self, actor: UserId, id: AgendaId, update: AgendaUpdate) -> WorkflowResult<Agenda> {
        let mut agenda = self.get(id).await?;
        if agenda.status.is_terminal() {
            return Err(WorkflowError::NotEditable {
                entity: "agenda",
                id,
                status: agenda.status.label(),
            });
        }

        match update {
            AgendaUpdate::GeneralInfo {
                event_date,
                hour,
                office_letter_number,
                subject,
            } => {
                require_fields(&[("office_letter_number", office_letter_number.as_str())])?;
                agenda.event_date = event_date;
                agenda.hour = hour;
                agenda.office_letter_number = office_letter_number;
                agenda.subject = subject;
                agenda.updated_at = Utc::now();
                self.ctx.store.update_agenda(&agenda).await?;
            }
            AgendaUpdate::PointsAndRoster {
                points,
                base_roster,
                invited_roster,
            } => {
                let previous: BTreeSet<UserId> = self
                    .ctx
                    .store
                    .list_participants(id)
                    .await?
                    .into_iter()
                    .map(|p| p.user_id)
                    .collect();

                agenda.points = points;
                agenda.base_roster = base_roster;
                agenda.invited_roster = invited_roster;
                agenda.updated_at = Utc::now();
                self.ctx.store.update_agenda(&agenda).await?;

                // Destructive replace: seen/confirmed state is not carried over
                self.ctx.store.delete_participants(id).await?;
                let mut added = Vec::new();
                for (user_id, roster) in agenda.roster_entries() {
                    self.ctx
                        .store
                        .upsert_participant(&AgendaParticipant::new(id, user_id, roster))
                        .await?;
                    if !previous.contains(&user_id) {
                        added.push(user_id);
                    }
                }

                for user_id in added {
                    self.notify_convocation(actor, &agenda, user_id).await;
                }
            }
        }

        info!(agenda_id = id, "Agenda updated");
        Ok(agenda)
    }

    /// Validate against the table and change nothing but the status
    pub async fn set_status(&self, id: AgendaId, next: AgendaStatus) -> WorkflowResult<Agenda> {
        let mut agenda = self.get(id).await?;
        ensure_transition("agenda", agenda.status, next)?;

        agenda.status = next;
        agenda.updated_at = Utc::now();
        self.ctx.store.update_agenda(&agenda).await?;
        info!(agenda_id = id, status = next.label(), "Agenda status changed");
        Ok(agenda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NotificationTarget, Roster};
    use crate::store::{AgendaStore, InMemoryStore, NotificationStore, RequestStore};
    use crate::workflows::test_support::*;

    fn new_agenda(request_id: RequestId) -> NewAgenda {
        NewAgenda {
            request_id,
            event_date: date(),
            hour: time(),
            office_letter_number: "OF-COM-3".to_string(),
            subject: AgendaSubject::Convocation,
            points: vec!["Revisión de la solicitud".to_string()],
            base_roster: vec![10, 11],
            invited_roster: vec![20],
        }
    }

    async fn notified_users(store: &InMemoryStore) -> Vec<UserId> {
        store
            .list_notifications()
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.category == NotificationCategory::Agenda)
            .filter_map(|n| match n.target {
                NotificationTarget::User(id) => Some(id),
                NotificationTarget::Roles(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_convenes_and_moves_request() {
        let fx = fixture().await;
        let request = seed_request(&fx.store, RequestStatus::Approved).await;
        let scheduler = CommitteeAgendaScheduler::new(fx.ctx.clone());

        let agenda = scheduler.create(30, new_agenda(request.id)).await.unwrap();
        assert_eq!(agenda.status, AgendaStatus::Convened);

        let participants = fx.store.list_participants(agenda.id).await.unwrap();
        let rosters: Vec<(UserId, Roster)> = participants.iter().map(|p| (p.user_id, p.roster)).collect();
        assert_eq!(rosters, vec![(10, Roster::Base), (11, Roster::Base), (20, Roster::Invited)]);
        assert_eq!(notified_users(&fx.store).await, vec![10, 11, 20]);
        // The InCommittee flip is a side effect; the owner gets nothing extra
        assert_eq!(fx.store.list_notifications().await.unwrap().len(), 3);

        let request = fx.store.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::InCommittee);
    }

    #[tokio::test]
    async fn test_pending_request_cannot_get_agenda() {
        let fx = fixture().await;
        let request = seed_request(&fx.store, RequestStatus::Pending).await;
        let scheduler = CommitteeAgendaScheduler::new(fx.ctx.clone());

        assert!(matches!(
            scheduler.create(30, new_agenda(request.id)).await,
            Err(WorkflowError::InvalidTransition { .. })
        ));
        assert!(scheduler.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_agenda_needs_terminal_first() {
        let fx = fixture().await;
        let request = seed_request(&fx.store, RequestStatus::Approved).await;
        let scheduler = CommitteeAgendaScheduler::new(fx.ctx.clone());

        let first = scheduler.create(30, new_agenda(request.id)).await.unwrap();
        match scheduler.create(30, new_agenda(request.id)).await {
            Err(WorkflowError::ActiveAgendaExists { agenda_id, .. }) => assert_eq!(agenda_id, first.id),
            other => panic!("expected ActiveAgendaExists, got {other:?}"),
        }

        scheduler.set_status(first.id, AgendaStatus::Cancelled).await.unwrap();
        let second = scheduler.create(30, new_agenda(request.id)).await.unwrap();
        assert_eq!(scheduler.current_for_request(request.id).await.unwrap().id, second.id);

        scheduler.set_status(second.id, AgendaStatus::Finished).await.unwrap();
        scheduler.create(30, new_agenda(request.id)).await.unwrap();
    }

    #[tokio::test]
    async fn test_roster_replace_notifies_only_new_users() {
        let fx = fixture().await;
        let request = seed_request(&fx.store, RequestStatus::Approved).await;
        let scheduler = CommitteeAgendaScheduler::new(fx.ctx.clone());
        let agenda = scheduler.create(30, new_agenda(request.id)).await.unwrap();

        let update = AgendaUpdate::PointsAndRoster {
            points: vec!["Punto único".to_string()],
            base_roster: vec![10],
            invited_roster: vec![30],
        };
        let updated = scheduler.update(1, agenda.id, update).await.unwrap();
        assert_eq!(updated.points, vec!["Punto único".to_string()]);

        let users: Vec<UserId> = fx
            .store
            .list_participants(agenda.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(users, vec![10, 30]);
        assert_eq!(notified_users(&fx.store).await, vec![10, 11, 20, 30]);
    }

    #[tokio::test]
    async fn test_general_info_update_keeps_participants() {
        let fx = fixture().await;
        let request = seed_request(&fx.store, RequestStatus::Approved).await;
        let scheduler = CommitteeAgendaScheduler::new(fx.ctx.clone());
        let agenda = scheduler.create(30, new_agenda(request.id)).await.unwrap();

        let mut seen = fx.store.get_participant(agenda.id, 10).await.unwrap().unwrap();
        seen.seen_at = Some(Utc::now());
        fx.store.upsert_participant(&seen).await.unwrap();

        let update = AgendaUpdate::GeneralInfo {
            event_date: date(),
            hour: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            office_letter_number: "OF-COM-4".to_string(),
            subject: AgendaSubject::Cancellation,
        };
        let updated = scheduler.update(30, agenda.id, update).await.unwrap();
        assert_eq!(updated.office_letter_number, "OF-COM-4");
        assert_eq!(fx.store.list_participants(agenda.id).await.unwrap().len(), 3);
        assert!(fx.store.get_participant(agenda.id, 10).await.unwrap().unwrap().seen_at.is_some());
    }

    #[tokio::test]
    async fn test_recovery_completes_provisional_agenda() {
        let fx = fixture().await;
        let request = seed_request(&fx.store, RequestStatus::Approved).await;
        let scheduler = CommitteeAgendaScheduler::new(fx.ctx.clone());

        // Simulate a crash after the agenda and one participant were written
        let now = Utc::now();
        let agenda = fx
            .store
            .insert_agenda(Agenda {
                id: 0,
                request_id: request.id,
                event_date: date(),
                hour: time(),
                office_letter_number: "OF-COM-9".to_string(),
                subject: AgendaSubject::Convocation,
                points: vec![],
                status: AgendaStatus::Provisional,
                base_roster: vec![10, 11],
                invited_roster: vec![20],
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        fx.store
            .upsert_participant(&AgendaParticipant::new(agenda.id, 10, Roster::Base))
            .await
            .unwrap();

        let report = scheduler.recover_provisional(0).await.unwrap();
        assert_eq!(report, RecoveryReport { completed: 1, failed: 0 });

        assert_eq!(scheduler.get(agenda.id).await.unwrap().status, AgendaStatus::Convened);
        assert_eq!(fx.store.list_participants(agenda.id).await.unwrap().len(), 3);
        assert_eq!(notified_users(&fx.store).await, vec![11, 20]);
        let request = fx.store.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::InCommittee);

        // Nothing left to recover
        assert_eq!(scheduler.recover_provisional(0).await.unwrap(), RecoveryReport::default());
    }

    #[tokio::test]
    async fn test_set_status_rejects_reopening() {
        let fx = fixture().await;
        let request = seed_request(&fx.store, RequestStatus::Approved).await;
        let scheduler = CommitteeAgendaScheduler::new(fx.ctx.clone());
        let agenda = scheduler.create(30, new_agenda(request.id)).await.unwrap();

        scheduler.set_status(agenda.id, AgendaStatus::InSession).await.unwrap();
        scheduler.set_status(agenda.id, AgendaStatus::Finished).await.unwrap();
        assert!(matches!(
            scheduler.set_status(agenda.id, AgendaStatus::InSession).await,
            Err(WorkflowError::InvalidTransition { .. })
        ));
    }
}
