//! Application state for API handlers.

use crate::config::DaemonConfig;
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use strato_ca::CertificateAuthority;
use strato_channel::ChannelMap;
use strato_coordinator::Coordinator;
use strato_enrollment::EnrollmentService;
use strato_ledger::QuotaLedger;
use strato_oracle::PermissionOracle;
use strato_registry::AgentRegistry;
use strato_scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub ca: Arc<CertificateAuthority>,
    pub enrollment: Arc<EnrollmentService>,
    pub registry: Arc<dyn AgentRegistry>,
    pub channels: Arc<ChannelMap>,
    pub oracle: Arc<dyn PermissionOracle>,
    pub ledger: Arc<QuotaLedger>,
    pub scheduler: Arc<Scheduler>,
    pub coordinator: Arc<Coordinator>,
    pub config: Arc<DaemonConfig>,
    pub version: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn Storage>,
        ca: Arc<CertificateAuthority>,
        enrollment: Arc<EnrollmentService>,
        registry: Arc<dyn AgentRegistry>,
        channels: Arc<ChannelMap>,
        oracle: Arc<dyn PermissionOracle>,
        ledger: Arc<QuotaLedger>,
        scheduler: Arc<Scheduler>,
        coordinator: Arc<Coordinator>,
        config: Arc<DaemonConfig>,
    ) -> Self {
        Self {
            storage,
            ca,
            enrollment,
            registry,
            channels,
            oracle,
            ledger,
            scheduler,
            coordinator,
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// Human-readable uptime, the same rendering the daemon's health
    /// endpoints have always used.
    pub fn uptime(&self) -> String {
        let secs = (Utc::now() - self.started_at).num_seconds();
        if secs < 60 {
            format!("{secs}s")
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
