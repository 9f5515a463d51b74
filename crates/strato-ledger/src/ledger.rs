//! The Quota Ledger: two-phase reserve/commit/release over a hierarchical
//! scope chain (§4.6).
//!
//! The chain-wide mutual exclusion is a sorted set of per-scope-id
//! `tokio::sync::Mutex` guards acquired in ascending scope-id order — not
//! materialized-path order — so two chains sharing a prefix always take
//! their common ancestor's lock in the same relative order, which is what
//! actually prevents deadlock (ascending-id order is just a convenient,
//! deterministic total order over scope ids).

use crate::error::{LedgerError, Result};
use crate::handle::{ReservationHandle, ReservationRecord, ReservationState};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use strato_types::{QuotaId, QuotaLimits, QuotaScope, Resources, ResourceQuota};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

fn scope_id(scope: &QuotaScope) -> Uuid {
    match scope {
        QuotaScope::Organization(id) => id.as_uuid(),
        QuotaScope::OrganizationalUnit(id) => id.as_uuid(),
        QuotaScope::Project(id) => id.as_uuid(),
    }
}

/// One link in a Reserve call's scope chain: a scope plus, for the leaf
/// project link only, the environment the VM targets (per-environment
/// quotas stack additively with the project-level quota).
#[derive(Debug, Clone)]
pub struct ScopeLink {
    pub scope: QuotaScope,
    pub environment: Option<String>,
}

pub struct QuotaLedger {
    quotas: DashMap<QuotaId, AsyncMutex<ResourceQuota>>,
    by_scope: DashMap<(Uuid, Option<String>), QuotaId>,
    scope_locks: DashMap<Uuid, Arc<AsyncMutex<()>>>,
    reservations: DashMap<ReservationHandle, ReservationRecord>,
    ttl: Duration,
}

impl QuotaLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            quotas: DashMap::new(),
            by_scope: DashMap::new(),
            scope_locks: DashMap::new(),
            reservations: DashMap::new(),
            ttl,
        }
    }

    pub fn insert_quota(&self, quota: ResourceQuota) {
        let key = (scope_id(&quota.scope), quota.environment.clone());
        self.by_scope.insert(key, quota.id);
        self.quotas.insert(quota.id, AsyncMutex::new(quota));
    }

    pub async fn get_quota(&self, id: QuotaId) -> Option<ResourceQuota> {
        let guard = self.quotas.get(&id)?;
        Some(guard.value().lock().await.clone())
    }

    fn lock_for(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        self.scope_locks
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Reserves `delta` against every enabled quota along `chain`. All or
    /// nothing: if any quota in the chain lacks headroom, no counters
    /// change for any quota in the chain.
    pub async fn reserve(&self, chain: &[ScopeLink], delta: Resources) -> Result<ReservationHandle> {
        let ids: BTreeSet<Uuid> = chain.iter().map(|l| scope_id(&l.scope)).collect();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let lock = self.lock_for(id);
            guards.push(lock.lock_owned().await);
        }

        let mut touched: Vec<QuotaId> = Vec::new();
        for link in chain {
            let quota_id = match self
                .by_scope
                .get(&(scope_id(&link.scope), link.environment.clone()))
            {
                Some(id) => *id,
                // No quota configured at this scope/environment means no
                // constraint there, not an error.
                None => continue,
            };
            touched.push(quota_id);
        }

        // Check phase: every touched quota must independently have
        // headroom. Nothing is mutated until every check has passed.
        for quota_id in &touched {
            let quota = self.quotas.get(quota_id).expect("touched implies present");
            let quota = quota.value().lock().await;
            if !quota.has_headroom(&delta, 1) {
                return Err(LedgerError::QuotaExceeded);
            }
        }

        // Commit (increment) phase.
        for quota_id in &touched {
            let quota = self.quotas.get(quota_id).expect("touched implies present");
            let mut quota = quota.value().lock().await;
            quota.reserved.resources = quota.reserved.resources + delta;
            quota.reserved.vm_count += 1;
        }

        let handle = ReservationHandle::new();
        self.reservations.insert(
            handle,
            ReservationRecord {
                quota_ids: touched,
                delta,
                vm_delta: 1,
                created_at: Utc::now(),
                state: ReservationState::Reserved,
            },
        );

        drop(guards);
        Ok(handle)
    }

    /// Marks a reservation durable; charged amounts remain.
    pub async fn commit(&self, handle: ReservationHandle) -> Result<()> {
        let mut record = self
            .reservations
            .get_mut(&handle)
            .ok_or(LedgerError::ReservationNotFound(handle.0))?;
        record.state = ReservationState::Committed;
        Ok(())
    }

    /// Releases a reservation's charge back to every quota it touched.
    pub async fn release(&self, handle: ReservationHandle) -> Result<()> {
        let (_, record) = self
            .reservations
            .remove(&handle)
            .ok_or(LedgerError::ReservationNotFound(handle.0))?;

        for quota_id in &record.quota_ids {
            if let Some(quota) = self.quotas.get(quota_id) {
                let mut quota = quota.value().lock().await;
                quota.reserved.resources = quota.reserved.resources.saturating_sub(&record.delta);
                quota.reserved.vm_count = quota.reserved.vm_count.saturating_sub(record.vm_delta);
            }
        }
        Ok(())
    }

    /// Lowers a quota's max, rejecting the change if it would violate
    /// currently-reserved amounts.
    pub async fn update_max(&self, quota_id: QuotaId, new_max: QuotaLimits) -> Result<()> {
        let quota = self
            .quotas
            .get(&quota_id)
            .ok_or(LedgerError::QuotaNotFound(quota_id))?;
        let mut quota = quota.value().lock().await;
        if !quota.can_lower_max_to(&new_max) {
            return Err(LedgerError::WouldViolateReservation);
        }
        quota.max = new_max;
        Ok(())
    }

    /// Deleting a quota while any reservation references it is rejected.
    pub async fn delete_quota(&self, quota_id: QuotaId) -> Result<()> {
        {
            let quota = self
                .quotas
                .get(&quota_id)
                .ok_or(LedgerError::QuotaNotFound(quota_id))?;
            let quota = quota.value().lock().await;
            if quota.reserved.resources != Resources::ZERO || quota.reserved.vm_count != 0 {
                return Err(LedgerError::HasOutstandingReservations);
            }
        }
        self.quotas.remove(&quota_id);
        self.by_scope.retain(|_, v| *v != quota_id);
        Ok(())
    }

    /// Releases any reservation older than the configured TTL that was
    /// never committed or released — the same `tokio::spawn` interval
    /// shape as the Registry's liveness sweeper.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<ReservationHandle> = self
            .reservations
            .iter()
            .filter(|e| e.state == ReservationState::Reserved && now - e.created_at > self.ttl)
            .map(|e| *e.key())
            .collect();

        for handle in &expired {
            tracing::warn!(%handle, "releasing reservation past TTL without commit");
            let _ = self.release(*handle).await;
        }
        expired.len()
    }

    pub fn spawn_sweeper(self: Arc<Self>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep_expired().await;
            }
        })
    }

    #[cfg(test)]
    pub fn get_quota_id_for_test(&self, scope: QuotaScope, environment: Option<String>) -> Option<QuotaId> {
        self.by_scope.get(&(scope_id(&scope), environment)).map(|e| *e)
    }
}

