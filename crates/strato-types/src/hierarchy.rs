//! Tagged-sum parent pointers and quota scopes.
//!
//! OUs and Projects hang off either an Organization or another OU; rather
//! than modeling that with two nullable foreign keys, the parent is a single
//! tagged sum. The Quota Ledger dispatches its walk-up behavior off the same
//! shape under a different name (`QuotaScope`).

use crate::ids::{OrganizationId, OuId, ProjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Parent {
    Organization(OrganizationId),
    OrganizationalUnit(OuId),
}

/// The chain of scopes a Quota Ledger reservation walks, root-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum QuotaScope {
    Organization(OrganizationId),
    OrganizationalUnit(OuId),
    Project(ProjectId),
}

/// A materialized ancestor path, stored on every hierarchical entity for
/// O(1) depth and O(depth) walk-up. The first element is always the owning
/// organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedPath(pub Vec<uuid::Uuid>);

impl MaterializedPath {
    pub fn root(org: OrganizationId) -> Self {
        Self(vec![org.as_uuid()])
    }

    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }

    pub fn contains(&self, id: uuid::Uuid) -> bool {
        self.0.contains(&id)
    }

    pub fn child(&self, id: uuid::Uuid) -> Self {
        let mut path = self.0.clone();
        path.push(id);
        Self(path)
    }

    /// Ids from the node itself up to (but not including) the root, i.e. the
    /// reverse of the stored path, used when a caller wants child-first
    /// traversal order.
    pub fn ancestors_child_first(&self) -> impl Iterator<Item = uuid::Uuid> + '_ {
        self.0.iter().rev().copied()
    }
}
