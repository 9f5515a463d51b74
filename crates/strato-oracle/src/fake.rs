//! In-memory fakes for every trait boundary — the codebase's established
//! preference for a hand-written fake over a generated mock.

use crate::client::{CheckResult, PermissionOracle};
use crate::error::Result;
use crate::permission::Permission;
use async_trait::async_trait;
use dashmap::DashMap;

/// Always allows; for tests that don't care about authorization.
pub struct AllowAllOracle;

#[async_trait]
impl PermissionOracle for AllowAllOracle {
    async fn check(&self, _subject: &str, _permission: Permission, _resource: &str) -> Result<CheckResult> {
        Ok(CheckResult {
            allowed: true,
            consistency_token: "fake".into(),
        })
    }
}

/// Always denies.
pub struct DenyAllOracle;

#[async_trait]
impl PermissionOracle for DenyAllOracle {
    async fn check(&self, _subject: &str, _permission: Permission, _resource: &str) -> Result<CheckResult> {
        Ok(CheckResult {
            allowed: false,
            consistency_token: "fake".into(),
        })
    }
}

/// Replays a scripted table of `(subject, permission, resource) -> allowed`
/// answers; any unscripted combination denies.
#[derive(Default)]
pub struct ScriptedOracle {
    table: DashMap<(String, &'static str, String), bool>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&self, subject: impl Into<String>, permission: Permission, resource: impl Into<String>) {
        self.table
            .insert((subject.into(), permission.as_str(), resource.into()), true);
    }

    pub fn deny(&self, subject: impl Into<String>, permission: Permission, resource: impl Into<String>) {
        self.table
            .insert((subject.into(), permission.as_str(), resource.into()), false);
    }
}

#[async_trait]
impl PermissionOracle for ScriptedOracle {
    async fn check(&self, subject: &str, permission: Permission, resource: &str) -> Result<CheckResult> {
        let allowed = self
            .table
            .get(&(subject.to_string(), permission.as_str(), resource.to_string()))
            .map(|v| *v)
            .unwrap_or(false);
        Ok(CheckResult {
            allowed,
            consistency_token: "fake".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unscripted_combination_denies() {
        let oracle = ScriptedOracle::new();
        let result = oracle.check("u1", Permission::CreateResources, "proj1").await.unwrap();
        assert!(!result.allowed);
    }

    #[tokio::test]
    async fn scripted_allow_takes_effect() {
        let oracle = ScriptedOracle::new();
        oracle.allow("u1", Permission::CreateResources, "proj1");
        let result = oracle.check("u1", Permission::CreateResources, "proj1").await.unwrap();
        assert!(result.allowed);
    }
}
