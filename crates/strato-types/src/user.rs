//! Users and groups.

use crate::ids::{GroupId, OrganizationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Created on first successful enrollment (human or onboarding); never
/// silently mutated thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub is_system_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A named set of users, scoped to an organization. Membership is the only
/// relation the core models directly; what a group can *do* lives entirely
/// in the Authorization Oracle's relation graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub members: Vec<UserId>,
}

impl Group {
    pub fn contains(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }
}
