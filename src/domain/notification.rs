use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NotificationId, RoleId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Request,
    Justification,
    Sufficiency,
    Document,
    Agenda,
    Minutes,
}

/// Destination of a notification: one user or a non-empty role set, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTarget {
    User(UserId),
    Roles(BTreeSet<RoleId>),
}

impl NotificationTarget {
    pub fn user(id: UserId) -> Self {
        NotificationTarget::User(id)
    }

    /// Returns `None` for an empty role set
    pub fn roles<I: IntoIterator<Item = RoleId>>(roles: I) -> Option<Self> {
        let set: BTreeSet<RoleId> = roles.into_iter().collect();
        if set.is_empty() {
            None
        } else {
            Some(NotificationTarget::Roles(set))
        }
    }

    pub fn matches(&self, user_id: UserId, roles: &BTreeSet<RoleId>) -> bool {
        match self {
            NotificationTarget::User(id) => *id == user_id,
            NotificationTarget::Roles(targets) => !targets.is_disjoint(roles),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub origin_user: UserId,
    pub target: NotificationTarget,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Payload pushed on the shared broadcast channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub notification_id: NotificationId,
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub origin_user: UserId,
    pub target: NotificationTarget,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Client-side filter: consumers keep only events meant for them
    pub fn is_addressed_to(&self, user_id: UserId, roles: &BTreeSet<RoleId>) -> bool {
        self.target.matches(user_id, roles)
    }
}

impl From<&Notification> for NotificationEvent {
    fn from(n: &Notification) -> Self {
        Self {
            notification_id: n.id,
            title: n.title.clone(),
            body: n.body.clone(),
            category: n.category,
            origin_user: n.origin_user,
            target: n.target.clone(),
            created_at: n.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_role_set_is_not_a_target() {
        assert!(NotificationTarget::roles(Vec::<RoleId>::new()).is_none());
    }

    #[test]
    fn test_target_matching() {
        let roles: BTreeSet<RoleId> = [3, 7].into_iter().collect();
        assert!(NotificationTarget::user(5).matches(5, &BTreeSet::new()));
        assert!(!NotificationTarget::user(5).matches(6, &roles));

        let target = NotificationTarget::roles([7, 9]).unwrap();
        assert!(target.matches(1, &roles));
        assert!(!target.matches(1, &BTreeSet::new()));
    }
}
