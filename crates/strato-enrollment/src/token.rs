//! Bearer join tokens: opaque, single-use, short-lived (≤ 15 min).
//!
//! Signed with a keyed BLAKE3 hash over a small canonical struct — the same
//! signing idiom used for other bearer tokens in this codebase, applied
//! here to `{agent_id, issued_at, expires_at, nonce}` rather than a full
//! message envelope. Single-use is enforced by *consuming* the token
//! record on first successful `enroll`, not a separate "used" flag, so a
//! concurrent double-redeem can only ever see it once.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use strato_types::{AgentId, JoinTokenId};

const MAC_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBody {
    pub id: JoinTokenId,
    pub agent_id: AgentId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub nonce: [u8; 16],
}

/// Signs and verifies join tokens with a server-held symmetric key.
pub struct TokenSigner {
    key: [u8; 32],
}

impl TokenSigner {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Mints a signed, opaque bearer token for `agent_id`, valid for `ttl`
    /// (clamped to 15 minutes per the data model's `JoinToken` invariant).
    /// Returns the token body (the caller records it for single-use
    /// enforcement) alongside the bearer string handed to the admin.
    pub fn mint(&self, agent_id: AgentId, ttl: Duration) -> (TokenBody, String) {
        let ttl = ttl.min(Duration::minutes(15));
        let now = Utc::now();
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let body = TokenBody {
            id: JoinTokenId::new(),
            agent_id,
            issued_at: now,
            expires_at: now + ttl,
            nonce,
        };
        let encoded = self.encode(&body);
        (body, encoded)
    }

    /// Verifies the MAC and decodes the body; does *not* check expiry or
    /// single-use — those are the caller's (`EnrollmentService`)
    /// responsibility, backed by the consumed-token store.
    pub fn verify(&self, token: &str) -> Option<TokenBody> {
        self.decode(token)
    }

    fn encode(&self, body: &TokenBody) -> String {
        let payload = serde_json::to_vec(body).expect("token body always serializes");
        let mac = blake3::keyed_hash(&self.key, &payload);
        let mut out = Vec::with_capacity(payload.len() + MAC_LEN);
        out.extend_from_slice(mac.as_bytes());
        out.extend_from_slice(&payload);
        data_encoding::BASE64URL_NOPAD.encode(&out)
    }

    fn decode(&self, token: &str) -> Option<TokenBody> {
        let raw = data_encoding::BASE64URL_NOPAD.decode(token.as_bytes()).ok()?;
        if raw.len() <= MAC_LEN {
            return None;
        }
        let (mac, payload) = raw.split_at(MAC_LEN);
        let expected = blake3::keyed_hash(&self.key, payload);
        if expected.as_bytes() != mac {
            return None;
        }
        serde_json::from_slice(payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_valid_token() {
        let signer = TokenSigner::new([7u8; 32]);
        let agent = AgentId::new();
        let (minted, token) = signer.mint(agent, Duration::minutes(5));
        let verified = signer.verify(&token).expect("token verifies");
        assert_eq!(verified.agent_id, agent);
        assert_eq!(verified.id, minted.id);
    }

    #[test]
    fn tampered_token_fails_verification() {
        let signer = TokenSigner::new([7u8; 32]);
        let (_, mut token) = signer.mint(AgentId::new(), Duration::minutes(5));
        token.push('x');
        assert!(signer.verify(&token).is_none());
    }

    #[test]
    fn ttl_is_clamped_to_fifteen_minutes() {
        let signer = TokenSigner::new([7u8; 32]);
        let agent = AgentId::new();
        let (_, token) = signer.mint(agent, Duration::hours(2));
        let verified = signer.verify(&token).unwrap();
        assert!(verified.expires_at <= Utc::now() + Duration::minutes(15) + Duration::seconds(1));
    }
}
