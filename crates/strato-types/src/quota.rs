//! Hierarchical reservation accounting records. The Quota Ledger (see
//! `strato-ledger`) is the only thing that mutates `reserved`; this struct
//! is the persisted shape it reads and writes.

use crate::hierarchy::QuotaScope;
use crate::ids::QuotaId;
use crate::resources::Resources;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub resources: Resources,
    pub vm_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub id: QuotaId,
    pub scope: QuotaScope,
    pub environment: Option<String>,
    pub max: QuotaLimits,
    pub reserved: QuotaLimits,
    pub enabled: bool,
}

impl ResourceQuota {
    pub fn headroom(&self) -> Resources {
        self.max.resources.saturating_sub(self.reserved.resources)
    }

    pub fn has_headroom(&self, delta: &Resources, delta_vms: u32) -> bool {
        self.enabled
            && self.headroom().covers(delta)
            && self.reserved.vm_count + delta_vms <= self.max.vm_count
    }

    /// Lowering a max below what is currently reserved is refused.
    pub fn can_lower_max_to(&self, new_max: &QuotaLimits) -> bool {
        new_max.resources.covers(&self.reserved.resources) && new_max.vm_count >= self.reserved.vm_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::QuotaId;

    fn quota(max: Resources, reserved: Resources) -> ResourceQuota {
        ResourceQuota {
            id: QuotaId::new(),
            scope: QuotaScope::Project(crate::ids::ProjectId::new()),
            environment: None,
            max: QuotaLimits {
                resources: max,
                vm_count: 5,
            },
            reserved: QuotaLimits {
                resources: reserved,
                vm_count: 1,
            },
            enabled: true,
        }
    }

    #[test]
    fn headroom_is_max_minus_reserved() {
        let q = quota(Resources::new(10, 20, 500), Resources::new(8, 10, 100));
        assert_eq!(q.headroom(), Resources::new(2, 10, 400));
    }

    #[test]
    fn exhausted_dimension_denies_reservation() {
        let q = quota(Resources::new(10, 20, 500), Resources::new(8, 10, 100));
        assert!(!q.has_headroom(&Resources::new(4, 1, 1), 1));
    }

    #[test]
    fn disabled_quota_never_has_headroom() {
        let mut q = quota(Resources::new(10, 20, 500), Resources::new(0, 0, 0));
        q.enabled = false;
        assert!(!q.has_headroom(&Resources::new(1, 1, 1), 1));
    }

    #[test]
    fn lowering_max_below_reserved_is_rejected() {
        let q = quota(Resources::new(10, 20, 500), Resources::new(8, 10, 100));
        let too_low = QuotaLimits {
            resources: Resources::new(4, 20, 500),
            vm_count: 5,
        };
        assert!(!q.can_lower_max_to(&too_low));
    }
}
