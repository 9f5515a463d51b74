//! HTTP client for stratod's admin surface.

use crate::error::{CliError, CliResult};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strato_types::{Agent, AgentId, ResourceQuota};

/// HTTP client for communicating with stratod
pub struct StratoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// stratod health response
#[derive(Debug, Deserialize)]
pub struct DaemonStatus {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

#[derive(Debug, Deserialize)]
pub struct BootstrapResponse {
    pub user: BootstrapUser,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct BootstrapUser {
    pub id: uuid::Uuid,
    pub display_name: String,
    pub is_system_admin: bool,
}

#[derive(Debug, Serialize)]
struct MintJoinTokenRequest {
    agent_id: AgentId,
    ttl_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct MintJoinTokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct RevokeCertificateRequest {
    certificate_serial: String,
    reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RevokeCertificateResponse {
    pub revoked: bool,
}

impl StratoClient {
    /// Create a new client. `api_key` is the bearer token presented on
    /// every request past `/healthz` and `/v1/bootstrap`.
    pub fn new(endpoint: &str, api_key: Option<String>) -> CliResult<Self> {
        let client = Client::builder().timeout(std::time::Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub async fn health_check(&self) -> CliResult<DaemonStatus> {
        self.get("/healthz").await
    }

    /// Single-use: fails once an admin user already exists.
    pub async fn bootstrap(&self) -> CliResult<BootstrapResponse> {
        self.post("/v1/bootstrap", &serde_json::json!({})).await
    }

    pub async fn mint_join_token(&self, agent_id: AgentId, ttl_secs: i64) -> CliResult<MintJoinTokenResponse> {
        self.post("/v1/enroll/join-token", &MintJoinTokenRequest { agent_id, ttl_secs })
            .await
    }

    pub async fn revoke_certificate(&self, certificate_serial: &str, reason: &str) -> CliResult<RevokeCertificateResponse> {
        self.post(
            "/v1/admin/certificates/revoke",
            &RevokeCertificateRequest {
                certificate_serial: certificate_serial.to_string(),
                reason: reason.to_string(),
            },
        )
        .await
    }

    pub async fn list_agents(&self) -> CliResult<Vec<Agent>> {
        self.get("/v1/agents").await
    }

    pub async fn get_agent(&self, agent_id: AgentId) -> CliResult<Agent> {
        self.get(&format!("/v1/agents/{agent_id}")).await
    }

    pub async fn list_quotas(&self) -> CliResult<Vec<ResourceQuota>> {
        self.get("/v1/quotas").await
    }

    // ========== Internal HTTP helpers ==========

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> CliResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.authorize(self.client.get(&url)).send().await?;
        self.handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> CliResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.authorize(self.client.post(&url).json(body)).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> CliResult<T> {
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else if status == StatusCode::NOT_FOUND {
            Err(CliError::NotFound("resource not found".into()))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(CliError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = StratoClient::new("http://localhost:8080", None).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_client_endpoint_normalization() {
        let client = StratoClient::new("http://localhost:8080/", None).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
