//! Server-side principal resolution
//!
//! The upstream gateway authenticates the caller and forwards only a user
//! id. Roles and permissions always come from the user store, never from the
//! client.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::debug;

use crate::domain::{Permission, RoleId, User, UserId};
use crate::error::{WorkflowError, WorkflowResult};
use crate::store::{StoreResult, WorkflowStore};

/// Authenticated caller with its resolved authorization context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub name: String,
    pub roles: BTreeSet<RoleId>,
    pub permissions: BTreeSet<Permission>,
}

impl Principal {
    /// Identity used by maintenance commands run outside any HTTP call
    pub fn system() -> Self {
        Self {
            user_id: 0,
            name: "system".to_string(),
            roles: BTreeSet::new(),
            permissions: [
                Permission::ReviewRequests,
                Permission::SubmitAnyRequest,
                Permission::ManageSufficiency,
                Permission::ManageAgendas,
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> WorkflowResult<()> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden(format!(
                "user {} lacks permission {:?}",
                self.user_id, permission
            )))
        }
    }

    /// Owners may act on their own records; everyone else needs `permission`
    pub fn require_owner_or(&self, owner: UserId, permission: Permission) -> WorkflowResult<()> {
        if self.user_id == owner {
            Ok(())
        } else {
            self.require(permission)
        }
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            name: user.name,
            roles: user.roles,
            permissions: user.permissions,
        }
    }
}

/// Resolves user ids into principals, caching lookups for a short TTL
#[derive(Clone)]
pub struct PrincipalResolver {
    store: Arc<dyn WorkflowStore>,
    cache: Cache<UserId, Principal>,
}

impl PrincipalResolver {
    pub fn new(store: Arc<dyn WorkflowStore>, ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { store, cache }
    }

    /// `Ok(None)` when the user is unknown
    pub async fn resolve(&self, user_id: UserId) -> StoreResult<Option<Principal>> {
        if let Some(principal) = self.cache.get(&user_id).await {
            return Ok(Some(principal));
        }

        let Some(user) = self.store.get_user(user_id).await? else {
            debug!(user_id, "Unknown principal");
            return Ok(None);
        };

        let principal = Principal::from(user);
        self.cache.insert(user_id, principal.clone()).await;
        Ok(Some(principal))
    }

    /// Drop a cached principal after its user record changed
    pub async fn invalidate(&self, user_id: UserId) {
        self.cache.invalidate(&user_id).await;
    }
}
