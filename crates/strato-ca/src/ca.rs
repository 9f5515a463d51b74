//! The Identity Service: a long-lived root keypair/certificate with a fixed
//! trust domain, issuing short-lived leaf identities bound to agent ids.

use crate::error::{CaError, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use rcgen::{
    Certificate, CertificateParams, CertificateRevocationListParams, CertificateSigningRequestParams,
    DistinguishedName, DnType, IsCa, KeyIdMethod, KeyPair, RevocationReason, RevokedCertParams, SanType,
    SerialNumber,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use strato_types::{CertificateSerial, CertificateStatus};
use x509_parser::prelude::*;

/// Extracts the CSR's own subject common name by independently re-parsing
/// the DER the client submitted, rather than trusting a caller-supplied
/// field — `issue_certificate` checks this against the expected agent id
/// before ever signing (§4.2: "verifies CSR.commonName == token.agentId").
fn csr_subject_common_name(csr_pem: &str) -> Result<String> {
    let pem = Pem::iter_from_buffer(csr_pem.as_bytes())
        .next()
        .ok_or_else(|| CaError::InvalidCsr("no PEM block found in CSR".into()))?
        .map_err(|e| CaError::InvalidCsr(e.to_string()))?;
    let (_, csr) = X509CertificationRequest::from_der(&pem.contents)
        .map_err(|e| CaError::InvalidCsr(e.to_string()))?;
    csr.certification_request_info
        .subject
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
        .ok_or_else(|| CaError::InvalidCsr("CSR subject has no common name".into()))
}

fn to_offset_date_time(dt: DateTime<Utc>) -> time::OffsetDateTime {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .expect("chrono timestamp fits time::OffsetDateTime")
}

#[derive(Debug, Clone)]
pub struct CertRecord {
    pub serial: CertificateSerial,
    pub subject_agent_id: String,
    pub public_key_fingerprint: [u8; 32],
    pub issued_at: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub status: CertificateStatus,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl CertRecord {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == CertificateStatus::Active && now < self.not_after
    }
}

/// Issued certificate, returned to the caller (Enrollment Service) as PEM.
pub struct IssuedCertificate {
    pub serial: CertificateSerial,
    pub certificate_pem: String,
    pub not_after: DateTime<Utc>,
}

/// The root CA. Holds its root keypair/cert in memory for the process
/// lifetime; I/O errors loading root key material are fatal at startup
/// (the daemon's `main` exits with code 2, see §6 exit codes).
pub struct CertificateAuthority {
    trust_domain: String,
    root: Certificate,
    root_key: KeyPair,
    max_validity: Duration,
    crl_interval: Duration,
    by_serial: DashMap<CertificateSerial, CertRecord>,
    by_fingerprint: DashMap<[u8; 32], String>,
    rng: RwLock<rand::rngs::StdRng>,
    crl_number: AtomicU64,
}

impl CertificateAuthority {
    /// Loads (or, on first boot, provisions) the root keypair and
    /// self-signed certificate fixing this control plane's trust domain.
    pub fn bootstrap(
        trust_domain: impl Into<String>,
        max_validity: Duration,
        crl_interval: Duration,
    ) -> Result<Self> {
        let trust_domain = trust_domain.into();
        let root_key = KeyPair::generate().map_err(|e| CaError::RootKeyUnavailable(e.to_string()))?;

        let mut params = CertificateParams::default();
        params.is_ca = IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, format!("Strato Root CA ({trust_domain})"));
        params.distinguished_name = dn;

        let root = params
            .self_signed(&root_key)
            .map_err(|e| CaError::RootKeyUnavailable(e.to_string()))?;

        Ok(Self {
            trust_domain,
            root,
            root_key,
            max_validity,
            crl_interval,
            by_serial: DashMap::new(),
            by_fingerprint: DashMap::new(),
            rng: RwLock::new(rand::SeedableRng::from_entropy()),
            crl_number: AtomicU64::new(1),
        })
    }

    pub fn trust_domain(&self) -> &str {
        &self.trust_domain
    }

    pub fn trust_bundle_pem(&self) -> String {
        self.root.pem()
    }

    /// Issues a certificate for `agent_id` from an externally-supplied CSR
    /// (PEM). Validity is clamped to the configured ceiling. Rejects a CSR
    /// whose public key already corresponds to an active certificate for a
    /// different agent.
    pub fn issue_certificate(
        &self,
        agent_id: &str,
        csr_pem: &str,
        requested_validity: Duration,
    ) -> Result<IssuedCertificate> {
        let csr = CertificateSigningRequestParams::from_pem(csr_pem)
            .map_err(|e| CaError::InvalidCsr(e.to_string()))?;

        let submitted_subject = csr_subject_common_name(csr_pem)?;
        if submitted_subject != agent_id {
            return Err(CaError::SubjectMismatch {
                csr_subject: submitted_subject,
                expected: agent_id.to_string(),
            });
        }

        let fingerprint = blake3::hash(csr.public_key.as_ref()).into();
        if let Some(existing_owner) = self.by_fingerprint.get(&fingerprint) {
            if existing_owner.as_str() != agent_id {
                return Err(CaError::KeyReuse);
            }
        }

        let validity = requested_validity.min(self.max_validity);
        let now = Utc::now();
        let not_after = now + validity;

        let serial = self.next_serial();
        let spiffe_uri = format!("spiffe://{}/agent/{agent_id}", self.trust_domain);

        let mut params = csr.params;
        params.not_before = time::OffsetDateTime::now_utc();
        params.not_after = time::OffsetDateTime::now_utc() + time::Duration::seconds(validity.num_seconds());
        params.subject_alt_names = vec![SanType::URI(spiffe_uri.clone())];
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, agent_id);
        params.distinguished_name = dn;
        params.serial_number = Some(rcgen::SerialNumber::from_slice(&serial.0.to_be_bytes()));

        let cert_der = params
            .signed_by(&self.root_key, &self.root, &self.root_key)
            .map_err(|e| CaError::SigningFailed(e.to_string()))?;

        self.by_serial.insert(
            serial,
            CertRecord {
                serial,
                subject_agent_id: agent_id.to_string(),
                public_key_fingerprint: fingerprint,
                issued_at: now,
                not_after,
                status: CertificateStatus::Active,
                revoked_at: None,
                revocation_reason: None,
            },
        );
        self.by_fingerprint.insert(fingerprint, agent_id.to_string());

        Ok(IssuedCertificate {
            serial,
            certificate_pem: cert_der.pem(),
            not_after,
        })
    }

    /// Flips the certificate to `revoked`; callers (Agent Channel) are
    /// responsible for closing any open session presenting this serial at
    /// the next validation cycle.
    pub fn revoke_certificate(&self, serial: CertificateSerial, reason: impl Into<String>) -> Result<()> {
        let mut record = self
            .by_serial
            .get_mut(&serial)
            .ok_or_else(|| CaError::SerialNotFound(serial.to_string()))?;
        record.status = CertificateStatus::Revoked;
        record.revoked_at = Some(Utc::now());
        record.revocation_reason = Some(reason.into());
        Ok(())
    }

    pub fn lookup(&self, serial: CertificateSerial) -> Option<CertRecord> {
        self.by_serial.get(&serial).map(|r| r.clone())
    }

    /// `true` only for a serial that maps to an `active`, unexpired
    /// certificate whose subject matches `agent_id` — the check the Agent
    /// Channel runs before accepting a connection.
    pub fn validate_for_agent(&self, serial: CertificateSerial, agent_id: &str, now: DateTime<Utc>) -> bool {
        self.by_serial
            .get(&serial)
            .is_some_and(|r| r.is_active(now) && r.subject_agent_id == agent_id)
    }

    /// All revoked, unexpired serials, as a real X.509 CRL signed by the
    /// root key, with `thisUpdate = now` and `nextUpdate = now +
    /// crl_interval` (§4.1).
    pub fn generate_crl(&self) -> Result<String> {
        let now = Utc::now();
        let next_update = now + self.crl_interval;

        let revoked_certs: Vec<RevokedCertParams> = self
            .by_serial
            .iter()
            .filter(|r| r.status == CertificateStatus::Revoked && r.not_after > now)
            .map(|r| RevokedCertParams {
                serial_number: SerialNumber::from_slice(&r.serial.0.to_be_bytes()),
                revocation_time: to_offset_date_time(r.revoked_at.unwrap_or(now)),
                reason_code: Some(RevocationReason::Unspecified),
                invalidity_date: None,
            })
            .collect();

        let crl_number = self.crl_number.fetch_add(1, Ordering::SeqCst);
        let params = CertificateRevocationListParams {
            this_update: to_offset_date_time(now),
            next_update: to_offset_date_time(next_update),
            crl_number: SerialNumber::from_slice(&crl_number.to_be_bytes()),
            issuing_distribution_point: None,
            revoked_certs,
            key_identifier_method: KeyIdMethod::Sha256,
            alg: self.root_key.algorithm(),
        };

        let crl = params
            .signed_by(&self.root, &self.root_key)
            .map_err(|e| CaError::SigningFailed(e.to_string()))?;
        Ok(crl.pem())
    }

    fn next_serial(&self) -> CertificateSerial {
        let mut rng = self.rng.write().expect("ca rng lock poisoned");
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        CertificateSerial(u128::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csr_pem_with_common_name(common_name: &str) -> String {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        params.distinguished_name = dn;
        params.serialize_request(&key).unwrap().pem()
    }

    #[test]
    fn issue_certificate_accepts_a_matching_csr_subject() {
        let ca = CertificateAuthority::bootstrap("strato.test", Duration::days(30), Duration::hours(24)).unwrap();
        let csr_pem = csr_pem_with_common_name("agent-1");
        let issued = ca.issue_certificate("agent-1", &csr_pem, Duration::days(1)).unwrap();
        assert!(issued.certificate_pem.contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn issue_certificate_rejects_a_mismatched_csr_subject() {
        let ca = CertificateAuthority::bootstrap("strato.test", Duration::days(30), Duration::hours(24)).unwrap();
        let csr_pem = csr_pem_with_common_name("someone-else");
        let err = ca.issue_certificate("agent-1", &csr_pem, Duration::days(1)).unwrap_err();
        assert!(matches!(err, CaError::SubjectMismatch { .. }));
    }

    #[test]
    fn trust_bundle_is_stable_across_calls() {
        let ca = CertificateAuthority::bootstrap(
            "strato.test",
            Duration::days(30),
            Duration::hours(24),
        )
        .unwrap();
        assert_eq!(ca.trust_bundle_pem(), ca.trust_bundle_pem());
        assert!(ca.trust_bundle_pem().contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn generate_crl_produces_a_signed_pem() {
        let ca = CertificateAuthority::bootstrap(
            "strato.test",
            Duration::days(30),
            Duration::hours(24),
        )
        .unwrap();
        let pem = ca.generate_crl().unwrap();
        assert!(pem.contains("BEGIN X509 CRL"));
        assert!(pem.contains("END X509 CRL"));
    }

    #[test]
    fn revoking_unknown_serial_is_not_found() {
        let ca = CertificateAuthority::bootstrap(
            "strato.test",
            Duration::days(30),
            Duration::hours(24),
        )
        .unwrap();
        let err = ca.revoke_certificate(CertificateSerial(1), "test").unwrap_err();
        assert!(matches!(err, CaError::SerialNotFound(_)));
    }
}
