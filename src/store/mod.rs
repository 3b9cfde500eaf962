//! Persistence seam for workflow entities
//!
//! The store offers key/value-like access by primary key plus the handful of
//! filtered queries the workflows need. Writes are last-write-wins; nothing
//! here coordinates concurrent writers. Inserts ignore the `id` on the
//! incoming entity and return the row with the store-assigned id.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::*;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend failure: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Filter for request listings
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub department_id: Option<DepartmentId>,
    pub bucket: Option<StatusBucket>,
}

impl RequestFilter {
    pub fn matches(&self, request: &Request) -> bool {
        self.department_id.map_or(true, |d| d == request.department_id)
            && self.bucket.map_or(true, |b| b.contains(request.status))
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn upsert_user(&self, user: User) -> StoreResult<()>;
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert_request(&self, request: Request) -> StoreResult<Request>;
    async fn get_request(&self, id: RequestId) -> StoreResult<Option<Request>>;
    async fn update_request(&self, request: &Request) -> StoreResult<()>;
    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<Request>>;
}

#[async_trait]
pub trait JustificationStore: Send + Sync {
    async fn insert_justification(&self, justification: Justification) -> StoreResult<Justification>;
    async fn get_justification(&self, id: JustificationId) -> StoreResult<Option<Justification>>;
    async fn get_justification_by_request(&self, request_id: RequestId) -> StoreResult<Option<Justification>>;
    async fn update_justification(&self, justification: &Justification) -> StoreResult<()>;

    async fn insert_justification_document(&self, doc: JustificationDocument) -> StoreResult<JustificationDocument>;
    async fn get_justification_document(&self, id: DocumentId) -> StoreResult<Option<JustificationDocument>>;
    async fn list_justification_documents(&self, justification_id: JustificationId) -> StoreResult<Vec<JustificationDocument>>;
    async fn delete_justification_document(&self, id: DocumentId) -> StoreResult<bool>;
}

#[async_trait]
pub trait SufficiencyStore: Send + Sync {
    async fn insert_sufficiency(&self, record: BudgetSufficiencyRequest) -> StoreResult<BudgetSufficiencyRequest>;
    async fn get_sufficiency(&self, id: SufficiencyId) -> StoreResult<Option<BudgetSufficiencyRequest>>;
    async fn find_sufficiency(&self, request_id: RequestId, kind: SufficiencyKind) -> StoreResult<Option<BudgetSufficiencyRequest>>;
    async fn list_sufficiencies(&self, request_id: RequestId) -> StoreResult<Vec<BudgetSufficiencyRequest>>;
    async fn update_sufficiency(&self, record: &BudgetSufficiencyRequest) -> StoreResult<()>;

    async fn insert_sufficiency_document(&self, doc: SufficiencyDocument) -> StoreResult<SufficiencyDocument>;
    async fn list_sufficiency_documents(&self, sufficiency_id: SufficiencyId) -> StoreResult<Vec<SufficiencyDocument>>;
}

#[async_trait]
pub trait SupportingDocumentStore: Send + Sync {
    async fn insert_supporting_document(&self, doc: SupportingDocument) -> StoreResult<SupportingDocument>;
    async fn get_supporting_document(&self, id: DocumentId) -> StoreResult<Option<SupportingDocument>>;
    async fn list_supporting_documents(&self, request_id: RequestId) -> StoreResult<Vec<SupportingDocument>>;
    async fn update_supporting_document(&self, doc: &SupportingDocument) -> StoreResult<()>;
    async fn delete_supporting_document(&self, id: DocumentId) -> StoreResult<bool>;
}

#[async_trait]
pub trait AgendaStore: Send + Sync {
    async fn insert_agenda(&self, agenda: Agenda) -> StoreResult<Agenda>;
    async fn get_agenda(&self, id: AgendaId) -> StoreResult<Option<Agenda>>;
    async fn list_agendas(&self) -> StoreResult<Vec<Agenda>>;
    async fn list_agendas_for_request(&self, request_id: RequestId) -> StoreResult<Vec<Agenda>>;
    async fn update_agenda(&self, agenda: &Agenda) -> StoreResult<()>;

    async fn get_participant(&self, agenda_id: AgendaId, user_id: UserId) -> StoreResult<Option<AgendaParticipant>>;
    async fn list_participants(&self, agenda_id: AgendaId) -> StoreResult<Vec<AgendaParticipant>>;
    async fn list_participations(&self, user_id: UserId) -> StoreResult<Vec<AgendaParticipant>>;
    /// Insert, or update in place when the (agenda, user) row exists
    async fn upsert_participant(&self, participant: &AgendaParticipant) -> StoreResult<()>;
    async fn delete_participants(&self, agenda_id: AgendaId) -> StoreResult<usize>;
}

#[async_trait]
pub trait MinutesStore: Send + Sync {
    async fn insert_minutes(&self, minutes: Minutes) -> StoreResult<Minutes>;
    async fn get_minutes(&self, id: MinutesId) -> StoreResult<Option<Minutes>>;
    async fn get_minutes_by_agenda(&self, agenda_id: AgendaId) -> StoreResult<Option<Minutes>>;
    async fn update_minutes(&self, minutes: &Minutes) -> StoreResult<()>;

    async fn get_attendee(&self, minutes_id: MinutesId, user_id: UserId) -> StoreResult<Option<MinutesAttendee>>;
    async fn list_attendees(&self, minutes_id: MinutesId) -> StoreResult<Vec<MinutesAttendee>>;
    async fn upsert_attendee(&self, attendee: &MinutesAttendee) -> StoreResult<()>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification>;
    async fn get_notification(&self, id: NotificationId) -> StoreResult<Option<Notification>>;
    async fn update_notification(&self, notification: &Notification) -> StoreResult<()>;
    /// Undelivered rows with fewer than `max_attempts` attempts, oldest first
    async fn list_undelivered(&self, max_attempts: u32, limit: usize) -> StoreResult<Vec<Notification>>;
    async fn list_notifications(&self) -> StoreResult<Vec<Notification>>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(&self, comment: Comment) -> StoreResult<Comment>;
    async fn list_comments(&self, origin: CommentOrigin, origin_id: u64) -> StoreResult<Vec<Comment>>;
}

#[async_trait]
pub trait BlobDeletionStore: Send + Sync {
    async fn insert_pending_deletion(&self, pending: PendingBlobDeletion) -> StoreResult<PendingBlobDeletion>;
    async fn list_pending_deletions(&self, limit: usize) -> StoreResult<Vec<PendingBlobDeletion>>;
    async fn update_pending_deletion(&self, pending: &PendingBlobDeletion) -> StoreResult<()>;
    async fn delete_pending_deletion(&self, id: u64) -> StoreResult<bool>;
}

/// Combined store used by every workflow
pub trait WorkflowStore:
    UserStore
    + RequestStore
    + JustificationStore
    + SufficiencyStore
    + SupportingDocumentStore
    + AgendaStore
    + MinutesStore
    + NotificationStore
    + CommentStore
    + BlobDeletionStore
    + Send
    + Sync
{
}

impl<T> WorkflowStore for T where
    T: UserStore
        + RequestStore
        + JustificationStore
        + SufficiencyStore
        + SupportingDocumentStore
        + AgendaStore
        + MinutesStore
        + NotificationStore
        + CommentStore
        + BlobDeletionStore
        + Send
        + Sync
{
}
