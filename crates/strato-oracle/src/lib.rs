//! Authorization Oracle client (§4.5): a thin client to an external
//! Zanzibar-style relation store. The core's only obligations are passing
//! the right resource id and writing relationship tuples on create/move/
//! delete — inheritance itself is the external store's problem.

#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod fake;
pub mod permission;

pub use client::{CheckResult, PermissionOracle, ReqwestOracle};
pub use error::{OracleError, Result};
pub use fake::{AllowAllOracle, DenyAllOracle, ScriptedOracle};
pub use permission::Permission;
