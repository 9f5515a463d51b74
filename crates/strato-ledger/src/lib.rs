//! Quota Ledger (§4.6): hierarchical, two-phase reservation accounting
//! across organizations, organizational units, and projects.

#![deny(unsafe_code)]

pub mod error;
pub mod handle;
pub mod ledger;

pub use error::{LedgerError, Result};
pub use handle::{ReservationHandle, ReservationState};
pub use ledger::{QuotaLedger, ScopeLink};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use strato_types::{ProjectId, QuotaId, QuotaLimits, QuotaScope, Resources, ResourceQuota};

    fn quota(scope: QuotaScope, environment: Option<&str>, max: Resources, max_vms: u32) -> ResourceQuota {
        ResourceQuota {
            id: QuotaId::new(),
            scope,
            environment: environment.map(str::to_owned),
            max: QuotaLimits {
                resources: max,
                vm_count: max_vms,
            },
            reserved: QuotaLimits::default(),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn reserve_commit_release_round_trips_counters() {
        let project = ProjectId::new();
        let ledger = QuotaLedger::new(Duration::minutes(10));
        ledger.insert_quota(quota(
            QuotaScope::Project(project),
            None,
            Resources::new(10, 1024, 1024),
            5,
        ));

        let chain = vec![ScopeLink {
            scope: QuotaScope::Project(project),
            environment: None,
        }];
        let handle = ledger
            .reserve(&chain, Resources::new(4, 512, 0))
            .await
            .unwrap();

        let stored = ledger
            .get_quota(
                ledger
                    .get_quota_id_for_test(QuotaScope::Project(project), None)
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(stored.reserved.resources, Resources::new(4, 512, 0));
        assert_eq!(stored.reserved.vm_count, 1);

        ledger.commit(handle).await.unwrap();
        ledger.release(handle).await.unwrap();

        let stored = ledger
            .get_quota(
                ledger
                    .get_quota_id_for_test(QuotaScope::Project(project), None)
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(stored.reserved.resources, Resources::ZERO);
        assert_eq!(stored.reserved.vm_count, 0);
    }

    #[tokio::test]
    async fn exhausted_ancestor_quota_blocks_the_whole_chain() {
        let project = ProjectId::new();
        let org = strato_types::OrganizationId::new();
        let ledger = QuotaLedger::new(Duration::minutes(10));
        ledger.insert_quota(quota(
            QuotaScope::Project(project),
            None,
            Resources::new(100, 1024 * 1024, 1024 * 1024),
            100,
        ));
        ledger.insert_quota(quota(QuotaScope::Organization(org), None, Resources::new(2, 1, 1), 1));

        let chain = vec![
            ScopeLink {
                scope: QuotaScope::Project(project),
                environment: None,
            },
            ScopeLink {
                scope: QuotaScope::Organization(org),
                environment: None,
            },
        ];

        let result = ledger.reserve(&chain, Resources::new(4, 0, 0)).await;
        assert!(matches!(result, Err(LedgerError::QuotaExceeded)));

        let project_quota_id = ledger
            .get_quota_id_for_test(QuotaScope::Project(project), None)
            .unwrap();
        let stored = ledger.get_quota(project_quota_id).await.unwrap();
        assert_eq!(stored.reserved.vm_count, 0, "a rejected chain must not partially charge");
    }

    #[tokio::test]
    async fn sweeper_releases_reservations_past_ttl() {
        let project = ProjectId::new();
        let ledger = QuotaLedger::new(Duration::milliseconds(1));
        ledger.insert_quota(quota(
            QuotaScope::Project(project),
            None,
            Resources::new(10, 1024, 1024),
            5,
        ));
        let chain = vec![ScopeLink {
            scope: QuotaScope::Project(project),
            environment: None,
        }];
        ledger.reserve(&chain, Resources::new(1, 1, 1)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let released = ledger.sweep_expired().await;
        assert_eq!(released, 1);

        let project_quota_id = ledger
            .get_quota_id_for_test(QuotaScope::Project(project), None)
            .unwrap();
        let stored = ledger.get_quota(project_quota_id).await.unwrap();
        assert_eq!(stored.reserved.vm_count, 0);
    }
}
