//! Server setup and lifecycle management (§6): constructs every library
//! component from `DaemonConfig`, wires them onto one `AppState`, and
//! serves the combined REST + agent-channel surface.

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::api::tls::{build_server_config, MtlsAcceptor, PeerIdentity};
use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::storage::{InMemoryStorage, PostgresStorage, Storage};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use strato_ca::CertificateAuthority;
use strato_channel::ChannelMap;
use strato_coordinator::{Coordinator, VmStore};
use strato_enrollment::EnrollmentService;
use strato_ledger::QuotaLedger;
use strato_oracle::{AllowAllOracle, PermissionOracle, ReqwestOracle};
use strato_registry::{AgentRegistry, InMemoryAgentRegistry, LivenessSweeper};
use strato_scheduler::Scheduler;

/// The assembled control plane: every component `AppState` needs, plus the
/// background tasks (liveness sweeper, quota sweeper) kept alive for the
/// process lifetime.
pub struct Server {
    config: Arc<DaemonConfig>,
    state: AppState,
    _liveness_sweeper: tokio::task::JoinHandle<()>,
    _quota_sweeper: tokio::task::JoinHandle<()>,
    _revocation_sweeper: tokio::task::JoinHandle<()>,
}

impl Server {
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let config = Arc::new(config);

        let storage: Arc<dyn Storage> = match &config.storage {
            StorageConfig::Memory => Arc::new(InMemoryStorage::new()),
            StorageConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            } => Arc::new(
                PostgresStorage::new(url, *max_connections, *connect_timeout_secs)
                    .await
                    .map_err(|e| DaemonError::Persistence(e.to_string()))?,
            ),
        };

        let ca = Arc::new(
            CertificateAuthority::bootstrap(
                "strato",
                ChronoDuration::days(config.cert_max_validity_days),
                ChronoDuration::hours(24),
            )
            .map_err(|e| DaemonError::Ca(e.to_string()))?,
        );

        let signer_key: [u8; 32] = rand::random();
        let enrollment = Arc::new(EnrollmentService::new(
            signer_key,
            ca.clone(),
            ChronoDuration::days(config.cert_max_validity_days),
        ));

        let registry: Arc<dyn AgentRegistry> = Arc::new(InMemoryAgentRegistry::new());
        let liveness_sweeper = LivenessSweeper::new(
            registry.clone(),
            ChronoDuration::seconds(config.agent_heartbeat_window_secs as i64),
            Duration::from_secs(15),
        )
        .spawn();

        let channels = Arc::new(ChannelMap::new());

        let oracle: Arc<dyn PermissionOracle> = match (
            &config.permission_store_endpoint,
            &config.permission_store_token,
        ) {
            (Some(endpoint), Some(token)) => Arc::new(ReqwestOracle::new(endpoint.clone(), token.clone())),
            _ => {
                tracing::warn!(
                    "no permission_store_endpoint/permission_store_token configured; \
                     falling back to an allow-all oracle, which is only appropriate in development"
                );
                Arc::new(AllowAllOracle)
            }
        };

        let ledger = Arc::new(QuotaLedger::new(ChronoDuration::seconds(
            config.reservation_ttl_secs as i64,
        )));
        let quota_sweeper = ledger.clone().spawn_sweeper(Duration::from_secs(30));

        let scheduler = Arc::new(Scheduler::new(config.scheduling_strategy));

        let coordinator = Arc::new(Coordinator::new(
            registry.clone(),
            oracle.clone(),
            ledger.clone(),
            scheduler.clone(),
            channels.clone(),
            storage.clone() as Arc<dyn VmStore>,
            Duration::from_secs(config.server.command_timeout_secs),
        ));

        let revocation_sweeper =
            spawn_revocation_sweeper(ca.clone(), registry.clone(), channels.clone(), Duration::from_secs(15));

        let state = AppState::new(
            storage,
            ca,
            enrollment,
            registry,
            channels,
            oracle,
            ledger,
            scheduler,
            coordinator,
            config.clone(),
        );

        Ok(Self {
            config,
            state,
            _liveness_sweeper: liveness_sweeper,
            _quota_sweeper: quota_sweeper,
            _revocation_sweeper: revocation_sweeper,
        })
    }

    /// Runs the server. Serves TLS (REST + agent channel, client certs
    /// optional at the transport layer) when `tls_cert_path`/`tls_key_path`
    /// are both set; otherwise falls back to plaintext HTTP, over which the
    /// agent channel route stays unreachable since it requires a peer
    /// certificate that plaintext connections never carry.
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state.clone());

        match (&self.config.server.tls_cert_path, &self.config.server.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                let tls_config = build_server_config(cert_path, key_path, &self.state.ca.trust_bundle_pem())?;

                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    shutdown_signal().await;
                    shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
                });

                tracing::info!(%addr, "strato daemon listening (tls, mutual-auth optional)");
                axum_server::bind(addr)
                    .acceptor(MtlsAcceptor::new(tls_config))
                    .handle(handle)
                    .serve(app.into_make_service_with_connect_info::<PeerIdentity>())
                    .await
                    .map_err(|e| DaemonError::Server(e.to_string()))?;
            }
            _ => {
                tracing::warn!(
                    "no tls_cert_path/tls_key_path configured; serving plaintext HTTP, \
                     which the agent channel cannot use (development only)"
                );
                let listener = tokio::net::TcpListener::bind(addr).await?;
                tracing::info!(%addr, "strato daemon listening (plaintext)");
                axum::serve(listener, app.into_make_service())
                    .with_graceful_shutdown(shutdown_signal())
                    .await
                    .map_err(|e| DaemonError::Server(e.to_string()))?;
            }
        }

        tracing::info!("strato daemon shutting down");
        Ok(())
    }
}

/// Periodically checks every channel the daemon currently holds open
/// against the CA's revocation state and force-closes any whose
/// certificate is no longer active (§4.4: "invalidates any open channel
/// presenting that serial at next validation cycle"; §8 S6 bounds this to
/// within one liveness window).
fn spawn_revocation_sweeper(
    ca: Arc<CertificateAuthority>,
    registry: Arc<dyn AgentRegistry>,
    channels: Arc<ChannelMap>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();
            let snapshot = registry.snapshot().await;
            for agent in snapshot.agents {
                let Some(serial) = agent.certificate_serial else {
                    continue;
                };
                if ca.validate_for_agent(serial, &agent.id.to_string(), now) {
                    continue;
                }
                if let Some(channel) = channels.get(agent.id) {
                    tracing::warn!(agent_id = %agent.id, %serial, "revoked certificate still bound to an open channel, forcing close");
                    channel.force_close();
                }
            }
        }
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received terminate signal, initiating graceful shutdown");
        }
    }
}
