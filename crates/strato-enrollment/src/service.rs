//! The Enrollment Service: mints admin join tokens and redeems them against
//! a CSR to bootstrap a new agent's identity (§4.2).

use crate::error::{EnrollmentError, Result};
use crate::token::TokenSigner;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use strato_ca::{CaError, CertificateAuthority};
use strato_types::{AgentId, CertificateSerial, JoinTokenId};

/// Metadata an agent reports about itself at enrollment time; upserted
/// into the Agent Registry's record (status = `connecting`).
#[derive(Debug, Clone)]
pub struct EnrollmentMetadata {
    pub hostname: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub total_cpu: u32,
    pub total_memory: u64,
    pub total_disk: u64,
}

pub struct EnrollResult {
    pub certificate_pem: String,
    pub trust_bundle_pem: String,
    pub certificate_serial: CertificateSerial,
    pub agent_id: AgentId,
    pub metadata: EnrollmentMetadata,
}

pub struct EnrollmentService {
    signer: TokenSigner,
    ca: std::sync::Arc<CertificateAuthority>,
    /// Pending, unredeemed tokens keyed by id. Redeeming removes the entry;
    /// a missing entry on redemption is either `TokenAlreadyUsed` (it was
    /// here once) or `InvalidToken` (it never was).
    pending: DashMap<JoinTokenId, DateTime<Utc>>,
    seen: DashMap<JoinTokenId, ()>,
    cert_validity: Duration,
}

impl EnrollmentService {
    pub fn new(signer_key: [u8; 32], ca: std::sync::Arc<CertificateAuthority>, cert_validity: Duration) -> Self {
        Self {
            signer: TokenSigner::new(signer_key),
            ca,
            pending: DashMap::new(),
            seen: DashMap::new(),
            cert_validity,
        }
    }

    pub fn mint_join_token(&self, agent_id: AgentId, ttl: Duration) -> (String, DateTime<Utc>) {
        let (body, token) = self.signer.mint(agent_id, ttl);
        self.pending.insert(body.id, body.expires_at);
        (token, body.expires_at)
    }

    /// Verifies signature, expiry, and single-use, then asks the Identity
    /// Service to issue a certificate — which independently re-parses
    /// `csr_pem` and checks its subject common name against the token's
    /// bound agent id before signing anything.
    pub fn enroll(&self, join_token: &str, csr_pem: &str, metadata: EnrollmentMetadata) -> Result<EnrollResult> {
        let body = self.signer.verify(join_token).ok_or(EnrollmentError::InvalidToken)?;

        if self.seen.contains_key(&body.id) {
            return Err(EnrollmentError::TokenAlreadyUsed);
        }

        // Single-use: remove-on-redeem. A concurrent double-redeem races
        // on this `remove`; only the winner observes `Some`.
        let removed = self.pending.remove(&body.id);
        self.seen.insert(body.id, ());
        if removed.is_none() {
            return Err(EnrollmentError::TokenAlreadyUsed);
        }

        if Utc::now() >= body.expires_at {
            return Err(EnrollmentError::TokenExpired);
        }

        let expected_subject = body.agent_id.to_string();
        let issued = self
            .ca
            .issue_certificate(&expected_subject, csr_pem, self.cert_validity)
            .map_err(|e| match e {
                CaError::SubjectMismatch { csr_subject, expected } => {
                    EnrollmentError::SubjectMismatch { csr_subject, token_agent: expected }
                }
                other => EnrollmentError::CaUnavailable(other),
            })?;

        Ok(EnrollResult {
            certificate_pem: issued.certificate_pem,
            trust_bundle_pem: self.ca.trust_bundle_pem(),
            certificate_serial: issued.serial,
            agent_id: body.agent_id,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> EnrollmentService {
        let ca = std::sync::Arc::new(
            strato_ca::CertificateAuthority::bootstrap(
                "strato.test",
                Duration::days(30),
                Duration::hours(24),
            )
            .unwrap(),
        );
        EnrollmentService::new([1u8; 32], ca, Duration::days(7))
    }

    fn csr_pem_with_common_name(common_name: &str) -> String {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::default();
        let mut dn = rcgen::DistinguishedName::new();
        dn.push(rcgen::DnType::CommonName, common_name);
        params.distinguished_name = dn;
        params.serialize_request(&key).unwrap().pem()
    }

    fn meta() -> EnrollmentMetadata {
        EnrollmentMetadata {
            hostname: "h".into(),
            version: "1".into(),
            capabilities: vec![],
            total_cpu: 1,
            total_memory: 1,
            total_disk: 1,
        }
    }

    #[test]
    fn redeeming_twice_fails_the_second_time() {
        let svc = service();
        let agent = AgentId::new();
        let (token, _) = svc.mint_join_token(agent, Duration::minutes(5));
        let csr_pem = csr_pem_with_common_name(&agent.to_string());

        let first = svc.enroll(&token, &csr_pem, meta());
        assert!(first.is_ok());

        let second = svc.enroll(&token, &csr_pem, meta());
        assert!(matches!(second, Err(EnrollmentError::TokenAlreadyUsed)));
    }

    #[test]
    fn unknown_token_is_invalid() {
        let svc = service();
        let csr_pem = csr_pem_with_common_name("x");
        let err = svc.enroll("not-a-real-token", &csr_pem, meta()).unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidToken));
    }

    #[test]
    fn subject_mismatch_is_rejected_after_single_use_bookkeeping() {
        let svc = service();
        let agent = AgentId::new();
        let (token, _) = svc.mint_join_token(agent, Duration::minutes(5));

        // The token is burned even though the CSR's real subject doesn't
        // match — single-use bookkeeping happens before the CA checks the
        // CSR, so a second attempt never even gets that far.
        let csr_pem = csr_pem_with_common_name("someone-else");
        let first = svc.enroll(&token, &csr_pem, meta());
        assert!(matches!(first, Err(EnrollmentError::SubjectMismatch { .. })));

        let retry_csr = csr_pem_with_common_name(&agent.to_string());
        let second = svc.enroll(&token, &retry_csr, meta());
        assert!(matches!(second, Err(EnrollmentError::TokenAlreadyUsed)));
    }
}
