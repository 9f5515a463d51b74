//! Organizations, organizational units, and projects: the hierarchy that
//! the Authorization Oracle and Quota Ledger both walk.

use crate::hierarchy::{MaterializedPath, Parent};
use crate::ids::{OrganizationId, OuId, ProjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Root of the hierarchy. Invariant (enforced by the caller that creates
/// organizations, not representable in this struct alone): at least one
/// admin user exists — the Authorization Oracle's relation tuples are the
/// source of truth for who that is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub description: String,
}

/// `path` always begins with the owning organization's id; `depth` equals
/// `path.len() - 1`. Both are recomputed whenever the unit is moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationalUnit {
    pub id: OuId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub parent: Parent,
    pub path: MaterializedPath,
}

impl OrganizationalUnit {
    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    /// A move is only safe if the new parent's path does not already
    /// contain this unit's own id — otherwise the hierarchy would cycle.
    pub fn would_cycle(&self, new_parent_path: &MaterializedPath) -> bool {
        new_parent_path.contains(self.id.as_uuid())
    }
}

/// Exactly one parent (organization or OU); declares a non-empty set of
/// environment names and a default drawn from that set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub parent: Parent,
    pub path: MaterializedPath,
    pub environments: BTreeSet<String>,
    pub default_environment: String,
}

impl Project {
    pub fn new(
        id: ProjectId,
        organization_id: OrganizationId,
        name: impl Into<String>,
        parent: Parent,
        path: MaterializedPath,
        default_environment: impl Into<String>,
    ) -> Self {
        let default_environment = default_environment.into();
        let mut environments = BTreeSet::new();
        environments.insert(default_environment.clone());
        Self {
            id,
            organization_id,
            name: name.into(),
            parent,
            path,
            environments,
            default_environment,
        }
    }

    pub fn has_environment(&self, env: &str) -> bool {
        self.environments.contains(env)
    }

    /// The default environment may never be removed while it is the
    /// default; callers must reassign the default first.
    pub fn remove_environment(&mut self, env: &str) -> Result<(), crate::error::StratoError> {
        if env == self.default_environment {
            return Err(crate::error::StratoError::BadRequest(format!(
                "cannot remove default environment {env:?}"
            )));
        }
        self.environments.remove(env);
        Ok(())
    }
}
