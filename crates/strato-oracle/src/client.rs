//! `PermissionOracle`: one production implementation backed by `reqwest`
//! against the external relation store, plus in-memory fakes for tests.

use crate::error::{OracleError, Result};
use crate::permission::Permission;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
struct CheckRequest<'a> {
    subject: &'a str,
    permission: &'a str,
    resource: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct CheckResponse {
    allowed: bool,
    consistency_token: String,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub allowed: bool,
    pub consistency_token: String,
}

#[async_trait]
pub trait PermissionOracle: Send + Sync {
    async fn check(&self, subject: &str, permission: Permission, resource: &str) -> Result<CheckResult>;
}

/// Production client: `POST {endpoint}/check` with a bearer token. A
/// `reqwest` error or non-2xx response maps to `Unavailable`, never to an
/// implicit allow.
pub struct ReqwestOracle {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl ReqwestOracle {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl PermissionOracle for ReqwestOracle {
    async fn check(&self, subject: &str, permission: Permission, resource: &str) -> Result<CheckResult> {
        let response = self
            .http
            .post(format!("{}/check", self.endpoint))
            .bearer_auth(&self.token)
            .json(&CheckRequest {
                subject,
                permission: permission.as_str(),
                resource,
            })
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OracleError::Unavailable(format!(
                "permission store returned {}",
                response.status()
            )));
        }

        let body: CheckResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        Ok(CheckResult {
            allowed: body.allowed,
            consistency_token: body.consistency_token,
        })
    }
}
