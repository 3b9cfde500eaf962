//! In-memory store for development and tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::*;

type Table<K, V> = Arc<RwLock<BTreeMap<K, V>>>;

fn table<K, V>() -> Table<K, V> {
    Arc::new(RwLock::new(BTreeMap::new()))
}

/// Map-backed store; list results come back in id order
#[derive(Debug)]
pub struct InMemoryStore {
    sequence: Arc<AtomicU64>,
    users: Table<UserId, User>,
    requests: Table<RequestId, Request>,
    justifications: Table<JustificationId, Justification>,
    justification_documents: Table<DocumentId, JustificationDocument>,
    sufficiencies: Table<SufficiencyId, BudgetSufficiencyRequest>,
    sufficiency_documents: Table<DocumentId, SufficiencyDocument>,
    supporting_documents: Table<DocumentId, SupportingDocument>,
    agendas: Table<AgendaId, Agenda>,
    participants: Table<(AgendaId, UserId), AgendaParticipant>,
    minutes: Table<MinutesId, Minutes>,
    attendees: Table<(MinutesId, UserId), MinutesAttendee>,
    notifications: Table<NotificationId, Notification>,
    comments: Table<CommentId, Comment>,
    pending_deletions: Table<u64, PendingBlobDeletion>,
    /// While set, every document insert fails
    reject_documents: Arc<AtomicBool>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sequence: Arc::new(AtomicU64::new(0)),
            users: table(),
            requests: table(),
            justifications: table(),
            justification_documents: table(),
            sufficiencies: table(),
            sufficiency_documents: table(),
            supporting_documents: table(),
            agendas: table(),
            participants: table(),
            minutes: table(),
            attendees: table(),
            notifications: table(),
            comments: table(),
            pending_deletions: table(),
            reject_documents: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ids are unique across tables, which keeps fixtures unambiguous
    fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[cfg(test)]
    pub(crate) fn reject_document_inserts(&self, reject: bool) {
        self.reject_documents.store(reject, Ordering::Relaxed);
    }

    fn document_insert_allowed(&self) -> StoreResult<()> {
        if self.reject_documents.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("document table unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn upsert_user(&self, user: User) -> StoreResult<()> {
        self.users.write().await.insert(user.id, user);
        Ok(())
    }
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn insert_request(&self, mut request: Request) -> StoreResult<Request> {
        request.id = self.next_id();
        self.requests.write().await.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: RequestId) -> StoreResult<Option<Request>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn update_request(&self, request: &Request) -> StoreResult<()> {
        self.requests.write().await.insert(request.id, request.clone());
        Ok(())
    }

    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<Request>> {
        let requests = self.requests.read().await;
        Ok(requests.values().filter(|r| filter.matches(r)).cloned().collect())
    }
}

#[async_trait]
impl JustificationStore for InMemoryStore {
    async fn insert_justification(&self, mut justification: Justification) -> StoreResult<Justification> {
        justification.id = self.next_id();
        self.justifications
            .write()
            .await
            .insert(justification.id, justification.clone());
        Ok(justification)
    }

    async fn get_justification(&self, id: JustificationId) -> StoreResult<Option<Justification>> {
        Ok(self.justifications.read().await.get(&id).cloned())
    }

    async fn get_justification_by_request(&self, request_id: RequestId) -> StoreResult<Option<Justification>> {
        let justifications = self.justifications.read().await;
        Ok(justifications.values().find(|j| j.request_id == request_id).cloned())
    }

    async fn update_justification(&self, justification: &Justification) -> StoreResult<()> {
        self.justifications
            .write()
            .await
            .insert(justification.id, justification.clone());
        Ok(())
    }

    async fn insert_justification_document(&self, mut doc: JustificationDocument) -> StoreResult<JustificationDocument> {
        self.document_insert_allowed()?;
        doc.id = self.next_id();
        self.justification_documents.write().await.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn get_justification_document(&self, id: DocumentId) -> StoreResult<Option<JustificationDocument>> {
        Ok(self.justification_documents.read().await.get(&id).cloned())
    }

    async fn list_justification_documents(&self, justification_id: JustificationId) -> StoreResult<Vec<JustificationDocument>> {
        let docs = self.justification_documents.read().await;
        Ok(docs
            .values()
            .filter(|d| d.justification_id == justification_id)
            .cloned()
            .collect())
    }

    async fn delete_justification_document(&self, id: DocumentId) -> StoreResult<bool> {
        Ok(self.justification_documents.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl SufficiencyStore for InMemoryStore {
    async fn insert_sufficiency(&self, mut record: BudgetSufficiencyRequest) -> StoreResult<BudgetSufficiencyRequest> {
        record.id = self.next_id();
        self.sufficiencies.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_sufficiency(&self, id: SufficiencyId) -> StoreResult<Option<BudgetSufficiencyRequest>> {
        Ok(self.sufficiencies.read().await.get(&id).cloned())
    }

    async fn find_sufficiency(&self, request_id: RequestId, kind: SufficiencyKind) -> StoreResult<Option<BudgetSufficiencyRequest>> {
        let records = self.sufficiencies.read().await;
        Ok(records
            .values()
            .find(|s| s.request_id == request_id && s.kind == kind)
            .cloned())
    }

    async fn list_sufficiencies(&self, request_id: RequestId) -> StoreResult<Vec<BudgetSufficiencyRequest>> {
        let records = self.sufficiencies.read().await;
        Ok(records.values().filter(|s| s.request_id == request_id).cloned().collect())
    }

    async fn update_sufficiency(&self, record: &BudgetSufficiencyRequest) -> StoreResult<()> {
        self.sufficiencies.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn insert_sufficiency_document(&self, mut doc: SufficiencyDocument) -> StoreResult<SufficiencyDocument> {
        self.document_insert_allowed()?;
        doc.id = self.next_id();
        self.sufficiency_documents.write().await.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn list_sufficiency_documents(&self, sufficiency_id: SufficiencyId) -> StoreResult<Vec<SufficiencyDocument>> {
        let docs = self.sufficiency_documents.read().await;
        Ok(docs
            .values()
            .filter(|d| d.sufficiency_id == sufficiency_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SupportingDocumentStore for InMemoryStore {
    async fn insert_supporting_document(&self, mut doc: SupportingDocument) -> StoreResult<SupportingDocument> {
        self.document_insert_allowed()?;
        doc.id = self.next_id();
        self.supporting_documents.write().await.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn get_supporting_document(&self, id: DocumentId) -> StoreResult<Option<SupportingDocument>> {
        Ok(self.supporting_documents.read().await.get(&id).cloned())
    }

    async fn list_supporting_documents(&self, request_id: RequestId) -> StoreResult<Vec<SupportingDocument>> {
        let docs = self.supporting_documents.read().await;
        Ok(docs.values().filter(|d| d.request_id == request_id).cloned().collect())
    }

    async fn update_supporting_document(&self, doc: &SupportingDocument) -> StoreResult<()> {
        self.supporting_documents.write().await.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn delete_supporting_document(&self, id: DocumentId) -> StoreResult<bool> {
        Ok(self.supporting_documents.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl AgendaStore for InMemoryStore {
    async fn insert_agenda(&self, mut agenda: Agenda) -> StoreResult<Agenda> {
        agenda.id = self.next_id();
        self.agendas.write().await.insert(agenda.id, agenda.clone());
        Ok(agenda)
    }

    async fn get_agenda(&self, id: AgendaId) -> StoreResult<Option<Agenda>> {
        Ok(self.agendas.read().await.get(&id).cloned())
    }

    async fn list_agendas(&self) -> StoreResult<Vec<Agenda>> {
        Ok(self.agendas.read().await.values().cloned().collect())
    }

    async fn list_agendas_for_request(&self, request_id: RequestId) -> StoreResult<Vec<Agenda>> {
        let agendas = self.agendas.read().await;
        Ok(agendas.values().filter(|a| a.request_id == request_id).cloned().collect())
    }

    async fn update_agenda(&self, agenda: &Agenda) -> StoreResult<()> {
        self.agendas.write().await.insert(agenda.id, agenda.clone());
        Ok(())
    }

    async fn get_participant(&self, agenda_id: AgendaId, user_id: UserId) -> StoreResult<Option<AgendaParticipant>> {
        Ok(self.participants.read().await.get(&(agenda_id, user_id)).cloned())
    }

    async fn list_participants(&self, agenda_id: AgendaId) -> StoreResult<Vec<AgendaParticipant>> {
        let participants = self.participants.read().await;
        Ok(participants
            .range((agenda_id, UserId::MIN)..=(agenda_id, UserId::MAX))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn list_participations(&self, user_id: UserId) -> StoreResult<Vec<AgendaParticipant>> {
        let participants = self.participants.read().await;
        Ok(participants.values().filter(|p| p.user_id == user_id).cloned().collect())
    }

    async fn upsert_participant(&self, participant: &AgendaParticipant) -> StoreResult<()> {
        self.participants
            .write()
            .await
            .insert((participant.agenda_id, participant.user_id), participant.clone());
        Ok(())
    }

    async fn delete_participants(&self, agenda_id: AgendaId) -> StoreResult<usize> {
        let mut participants = self.participants.write().await;
        let before = participants.len();
        participants.retain(|(agenda, _), _| *agenda != agenda_id);
        Ok(before - participants.len())
    }
}

#[async_trait]
impl MinutesStore for InMemoryStore {
    async fn insert_minutes(&self, mut minutes: Minutes) -> StoreResult<Minutes> {
        minutes.id = self.next_id();
        self.minutes.write().await.insert(minutes.id, minutes.clone());
        Ok(minutes)
    }

    async fn get_minutes(&self, id: MinutesId) -> StoreResult<Option<Minutes>> {
        Ok(self.minutes.read().await.get(&id).cloned())
    }

    async fn get_minutes_by_agenda(&self, agenda_id: AgendaId) -> StoreResult<Option<Minutes>> {
        let minutes = self.minutes.read().await;
        Ok(minutes.values().find(|m| m.agenda_id == agenda_id).cloned())
    }

    async fn update_minutes(&self, minutes: &Minutes) -> StoreResult<()> {
        self.minutes.write().await.insert(minutes.id, minutes.clone());
        Ok(())
    }

    async fn get_attendee(&self, minutes_id: MinutesId, user_id: UserId) -> StoreResult<Option<MinutesAttendee>> {
        Ok(self.attendees.read().await.get(&(minutes_id, user_id)).cloned())
    }

    async fn list_attendees(&self, minutes_id: MinutesId) -> StoreResult<Vec<MinutesAttendee>> {
        let attendees = self.attendees.read().await;
        Ok(attendees
            .range((minutes_id, UserId::MIN)..=(minutes_id, UserId::MAX))
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn upsert_attendee(&self, attendee: &MinutesAttendee) -> StoreResult<()> {
        self.attendees
            .write()
            .await
            .insert((attendee.minutes_id, attendee.user_id), attendee.clone());
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(&self, mut notification: Notification) -> StoreResult<Notification> {
        notification.id = self.next_id();
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn get_notification(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        Ok(self.notifications.read().await.get(&id).cloned())
    }

    async fn update_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_undelivered(&self, max_attempts: u32, limit: usize) -> StoreResult<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .values()
            .filter(|n| n.delivered_at.is_none() && n.attempts < max_attempts)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_notifications(&self) -> StoreResult<Vec<Notification>> {
        Ok(self.notifications.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl CommentStore for InMemoryStore {
    async fn insert_comment(&self, mut comment: Comment) -> StoreResult<Comment> {
        comment.id = self.next_id();
        self.comments.write().await.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, origin: CommentOrigin, origin_id: u64) -> StoreResult<Vec<Comment>> {
        let comments = self.comments.read().await;
        Ok(comments
            .values()
            .filter(|c| c.origin == origin && c.origin_id == origin_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BlobDeletionStore for InMemoryStore {
    async fn insert_pending_deletion(&self, mut pending: PendingBlobDeletion) -> StoreResult<PendingBlobDeletion> {
        pending.id = self.next_id();
        self.pending_deletions.write().await.insert(pending.id, pending.clone());
        Ok(pending)
    }

    async fn list_pending_deletions(&self, limit: usize) -> StoreResult<Vec<PendingBlobDeletion>> {
        let pending = self.pending_deletions.read().await;
        Ok(pending.values().take(limit).cloned().collect())
    }

    async fn update_pending_deletion(&self, pending: &PendingBlobDeletion) -> StoreResult<()> {
        self.pending_deletions.write().await.insert(pending.id, pending.clone());
        Ok(())
    }

    async fn delete_pending_deletion(&self, id: u64) -> StoreResult<bool> {
        Ok(self.pending_deletions.write().await.remove(&id).is_some())
    }
}
