//! Dependency-bot status API client.

use std::collections::BTreeMap;

use reqwest::blocking::Client;
use serde::Deserialize;
use spyglass_core::dependabot::DependabotService;
use spyglass_core::error::{AuditError, Result};

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    data: Vec<WireRepo>,
}

#[derive(Debug, Deserialize)]
struct WireRepo {
    attributes: WireAttributes,
}

#[derive(Debug, Deserialize)]
struct WireAttributes {
    name: String,
    status: String,
}

/// REST client for the dependency-bot installation status API.
#[derive(Debug, Clone)]
pub struct DependabotApiClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl DependabotApiClient {
    /// Build a client from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("DEPENDABOT_API_URL")
            .unwrap_or_else(|_| "https://api.dependabot.com".to_string());
        let token = std::env::var("DEPENDABOT_TOKEN").ok();
        Self::new(base_url, token)
    }

    /// Build a client with explicit settings.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            client: Client::new(),
        }
    }
}

impl DependabotService for DependabotApiClient {
    fn repos_by_status(&self, org: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let url = format!("{}/repos", self.base_url.trim_end_matches('/'));
        let mut request = self.client.get(url).query(&[("org", org)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|err| AuditError::Upstream(format!("dependabot request failed: {err}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(AuditError::Upstream(format!(
                "dependabot api error ({status}): {body}"
            )));
        }
        let envelope: WireEnvelope = response.json().map_err(|err| {
            AuditError::Upstream(format!("dependabot response decode failed: {err}"))
        })?;

        let mut by_status: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for repo in envelope.data {
            by_status
                .entry(repo.attributes.status)
                .or_default()
                .push(repo.attributes.name);
        }
        Ok(by_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    #[test]
    fn repos_are_grouped_by_status() {
        let server = MockServer::start();
        let repos = server.mock(|when, then| {
            when.method(GET).path("/repos").query_param("org", "acme");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "data": [
                        {"attributes": {"name": "api", "status": "active"}},
                        {"attributes": {"name": "site", "status": "paused"}},
                        {"attributes": {"name": "tool", "status": "active"}}
                    ]
                }));
        });

        let client = DependabotApiClient::new(server.url(""), Some("token".to_string()));
        let by_status = client.repos_by_status("acme").expect("fetch");

        assert_eq!(by_status["active"], vec!["api", "tool"]);
        assert_eq!(by_status["paused"], vec!["site"]);
        repos.assert();
    }

    #[test]
    fn api_errors_surface_as_upstream() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos");
            then.status(503).body("maintenance");
        });

        let client = DependabotApiClient::new(server.url(""), None);
        let err = client.repos_by_status("acme").unwrap_err();
        assert!(err.to_string().contains("dependabot api error"));
    }
}
