//! Certificates and join tokens issued by the Identity Service and
//! consumed by the Enrollment Service.

use crate::ids::{AgentId, CertificateSerial, JoinTokenId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Active,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub serial: CertificateSerial,
    pub subject_agent_id: AgentId,
    pub spiffe_uri: String,
    pub issued_at: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub status: CertificateStatus,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl Certificate {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == CertificateStatus::Active && now < self.not_after
    }
}

/// A signed bearer value binding a single intended agent identifier; the
/// signature itself lives in `strato-enrollment`, not here — this is only
/// the record the Enrollment Service consumes on single use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinToken {
    pub id: JoinTokenId,
    pub agent_id: AgentId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl JoinToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
