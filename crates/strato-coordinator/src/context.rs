//! Project hierarchy data the Coordinator needs but does not own. The
//! caller (the daemon's HTTP layer, which holds the organization/OU/project
//! tables) resolves a project's scope chain once per request and hands it
//! down here rather than the Coordinator owning hierarchy storage itself.

use std::collections::BTreeSet;
use strato_ledger::ScopeLink;
use strato_types::{OrganizationId, OrganizationalUnit, OuId, Project, ProjectId, QuotaScope};

#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub project_id: ProjectId,
    pub organization_id: OrganizationId,
    pub environments: BTreeSet<String>,
    /// Project scope first, then each ancestor OU, then the organization —
    /// root-first order is not required by the Ledger, which only needs the
    /// full set.
    pub scope_chain: Vec<strato_types::QuotaScope>,
}

impl ProjectContext {
    /// Builds a scope chain from a project and the OUs on its path. `ous`
    /// need not be in any particular order; only entries whose id appears
    /// in `project.path` are used. The materialized path is root-first and
    /// begins with the organization id, so the project's own id (always
    /// the path's last entry once the project itself has a path built by
    /// `path.child(project.id)`) is filtered out before the remainder is
    /// resolved against `ous`.
    pub fn from_project(project: &Project, ous: &[OrganizationalUnit]) -> Self {
        let mut scope_chain = vec![QuotaScope::Project(project.id)];

        for ancestor in project.path.0.iter().filter(|id| **id != project.id.as_uuid()) {
            if *ancestor == project.organization_id.as_uuid() {
                scope_chain.push(QuotaScope::Organization(project.organization_id));
            } else if let Some(ou) = ous.iter().find(|ou| ou.id.as_uuid() == *ancestor) {
                scope_chain.push(QuotaScope::OrganizationalUnit(ou.id));
            } else {
                scope_chain.push(QuotaScope::OrganizationalUnit(OuId::from_uuid(*ancestor)));
            }
        }

        Self {
            project_id: project.id,
            organization_id: project.organization_id,
            environments: project.environments.clone(),
            scope_chain,
        }
    }

    /// Project-level (no environment) and environment-scoped quotas stack
    /// additively, so the project scope contributes two links: one with
    /// `environment: None` and one with `environment: Some(environment)`.
    /// OU/organization scopes never carry an environment.
    pub fn ledger_chain(&self, environment: &str) -> Vec<ScopeLink> {
        let mut chain = Vec::with_capacity(self.scope_chain.len() + 1);
        for scope in &self.scope_chain {
            chain.push(ScopeLink {
                scope: *scope,
                environment: None,
            });
            if matches!(scope, strato_types::QuotaScope::Project(_)) {
                chain.push(ScopeLink {
                    scope: *scope,
                    environment: Some(environment.to_string()),
                });
            }
        }
        chain
    }
}
