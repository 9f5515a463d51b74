//! Storage layer for stratod.
//!
//! Two backends share one set of traits: `InMemoryStorage` for development
//! and tests, `PostgresStorage` for production (selected by `DATABASE_URL`
//! or an explicit `storage.type = "postgres"` config entry).

mod memory;
mod postgres;
mod traits;

pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;
pub use traits::{
    ApiKey, ApiKeyStore, AgentStore, CertificateStore, GroupStore, OrganizationStore, OuStore,
    ProjectStore, QuotaStore, Storage, UserStore,
};
