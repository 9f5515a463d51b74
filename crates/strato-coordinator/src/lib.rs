//! VM Lifecycle Coordinator (§4.8): sole owner of cross-cutting contracts
//! for VM create/control/delete, composing the Registry, the Authorization
//! Oracle, the Quota Ledger, the Scheduler, and the Agent Channel map.

#![deny(unsafe_code)]

pub mod context;
pub mod coordinator;
pub mod error;
pub mod vm_store;

pub use context::ProjectContext;
pub use coordinator::{Coordinator, CreateVmRequest};
pub use error::Result;
pub use vm_store::VmStore;
