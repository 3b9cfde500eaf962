use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CommentId, UserId};

/// Kind tag of the entity a comment thread hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentOrigin {
    Request,
    Justification,
    Sufficiency,
    Document,
    Agenda,
    Minutes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub origin: CommentOrigin,
    pub origin_id: u64,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
