use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{DepartmentId, RoleId, UserId};

/// Server-side permissions checked by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Move requests, justifications and documents through review
    ReviewRequests,
    /// Sign and submit requests owned by someone else
    SubmitAnyRequest,
    /// Send sufficiency requests and upload budget responses
    ManageSufficiency,
    /// Create and edit agendas and minutes
    ManageAgendas,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub title: String,
    pub department_id: DepartmentId,
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}
