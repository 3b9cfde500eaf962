// Domain entities for the procurement committee workflow
//
// Every entity that carries a status exposes it as a closed enum with its
// own transition table; `WorkflowStatus` is the shared surface the
// orchestrator validates against.

pub mod agenda;
pub mod comment;
pub mod documents;
pub mod justification;
pub mod minutes;
pub mod notification;
pub mod request;
pub mod sufficiency;
pub mod user;

pub use agenda::{Agenda, AgendaParticipant, AgendaStatus, AgendaSubject, Roster};
pub use comment::{Comment, CommentOrigin};
pub use documents::{BlobHandle, PendingBlobDeletion, SupportingDocument, SupportingDocumentStatus};
pub use justification::{Justification, JustificationDocument, JustificationStatus, OfficeLetter};
pub use minutes::{AttendeeRoster, Minutes, MinutesAttendee, MinutesStatus};
pub use notification::{Notification, NotificationCategory, NotificationEvent, NotificationTarget};
pub use request::{Request, RequestStatus, StatusBucket};
pub use sufficiency::{BudgetSufficiencyRequest, SufficiencyDocument, SufficiencyKind, SufficiencyStatus};
pub use user::{Permission, User};

pub type UserId = u64;
pub type RoleId = u64;
pub type RequestId = u64;
pub type DepartmentId = u64;
pub type JustificationId = u64;
pub type SufficiencyId = u64;
pub type DocumentId = u64;
pub type AgendaId = u64;
pub type MinutesId = u64;
pub type NotificationId = u64;
pub type CommentId = u64;

/// Closed status vocabulary with an explicit adjacency table.
pub trait WorkflowStatus: Copy + PartialEq + std::fmt::Debug + 'static {
    /// Human-facing label stored and shown to users
    fn label(&self) -> &'static str;

    /// Statuses reachable in one step from `self`
    fn successors(&self) -> &'static [Self];

    fn can_transition_to(&self, next: Self) -> bool {
        self.successors().contains(&next)
    }

    fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}
