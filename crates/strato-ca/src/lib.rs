//! Identity Service (CA): root keypair, certificate issuance/revocation,
//! trust bundle, and CRL generation (§4.1).

#![deny(unsafe_code)]

pub mod ca;
pub mod error;

pub use ca::{CertRecord, CertificateAuthority, IssuedCertificate};
pub use error::{CaError, Result};
