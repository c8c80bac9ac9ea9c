//! GitHub GraphQL and REST client implementations.

use reqwest::blocking::Client;
use serde::Deserialize;
use spyglass_core::domain::{
    BranchActivity, OwnerInfo, PullRequestSummary, RepositoryNode, Severity, VulnerabilityAlert,
};
use spyglass_core::error::{AuditError, Result};
use spyglass_core::query::{PageRequest, PagedQuery, QueryKind, QueryPage};
use spyglass_core::advisories::AlertEndpoint;

const REPOSITORIES_QUERY: &str = r#"
query($org: String!, $nth: Int!, $after: String) {
  organization(login: $org) {
    repositories(first: $nth, after: $after) {
      pageInfo { hasNextPage endCursor }
      nodes {
        name
        isPrivate
        owner { login }
        repositoryTopics(first: 50) {
          edges { node { topic { name } } }
        }
        vulnerabilityAlerts(first: 50, states: OPEN) {
          edges {
            node {
              securityVulnerability {
                severity
                package { name }
                firstPatchedVersion { identifier }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const REFS_QUERY: &str = r#"
query($org: String!, $nth: Int!, $after: String) {
  organization(login: $org) {
    repositories(first: $nth, after: $after) {
      pageInfo { hasNextPage endCursor }
      nodes {
        name
        isPrivate
        owner { login }
        refs(refPrefix: "refs/heads/", first: 50) {
          edges {
            node {
              name
              target {
                ... on Commit {
                  history(first: 100) {
                    edges { node { committedDate } }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const PRS_QUERY: &str = r#"
query($org: String!, $nth: Int!, $after: String) {
  organization(login: $org) {
    repositories(first: $nth, after: $after) {
      pageInfo { hasNextPage endCursor }
      nodes {
        name
        isPrivate
        owner { login }
        pullRequests(first: 20, orderBy: {field: CREATED_AT, direction: DESC}) {
          edges {
            node { merged closed createdAt mergedAt closedAt }
          }
        }
      }
    }
  }
}
"#;

fn query_document(kind: QueryKind) -> &'static str {
    match kind {
        QueryKind::Repositories => REPOSITORIES_QUERY,
        QueryKind::ActivityRefs => REFS_QUERY,
        QueryKind::ActivityPullRequests => PRS_QUERY,
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    data: Option<GraphqlData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    organization: WireOrganization,
}

#[derive(Debug, Deserialize)]
struct WireOrganization {
    repositories: WireConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireConnection {
    nodes: Vec<WireRepository>,
    page_info: WirePageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireRepository {
    name: String,
    is_private: bool,
    owner: WireOwner,
    repository_topics: WireEdges<WireTopicNode>,
    vulnerability_alerts: WireEdges<WireAlertNode>,
    pull_requests: Option<WireEdges<WirePullRequest>>,
    refs: Option<WireEdges<WireRef>>,
}

#[derive(Debug, Default, Deserialize)]
struct WireOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct WireEdges<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<WireEdge<T>>,
}

impl<T> Default for WireEdges<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
struct WireEdge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct WireTopicNode {
    topic: WireTopic,
}

#[derive(Debug, Deserialize)]
struct WireTopic {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAlertNode {
    security_vulnerability: Option<WireVulnerability>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVulnerability {
    severity: String,
    package: WirePackage,
    first_patched_version: Option<WirePatchedVersion>,
}

#[derive(Debug, Deserialize)]
struct WirePackage {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WirePatchedVersion {
    identifier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePullRequest {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    closed: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    merged_at: Option<chrono::DateTime<chrono::Utc>>,
    closed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireRef {
    name: String,
    target: Option<WireRefTarget>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireRefTarget {
    history: WireEdges<WireCommit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCommit {
    committed_date: chrono::DateTime<chrono::Utc>,
}

impl WireRepository {
    fn into_node(self) -> RepositoryNode {
        let topics = self
            .repository_topics
            .edges
            .into_iter()
            .map(|edge| edge.node.topic.name)
            .collect();
        let vulnerability_alerts = self
            .vulnerability_alerts
            .edges
            .into_iter()
            .filter_map(|edge| edge.node.security_vulnerability)
            .filter_map(|vulnerability| {
                let Some(severity) = Severity::from_label(&vulnerability.severity) else {
                    log::warn!(
                        "skipping alert with unknown severity {:?} on {}",
                        vulnerability.severity,
                        self.name
                    );
                    return None;
                };
                Some(VulnerabilityAlert {
                    package: vulnerability.package.name,
                    severity,
                    patched_version: vulnerability
                        .first_patched_version
                        .map(|version| version.identifier),
                })
            })
            .collect();
        let pull_requests = self.pull_requests.map(|connection| {
            connection
                .edges
                .into_iter()
                .map(|edge| PullRequestSummary {
                    merged: edge.node.merged,
                    closed: edge.node.closed,
                    created_at: edge.node.created_at,
                    merged_at: edge.node.merged_at,
                    closed_at: edge.node.closed_at,
                })
                .collect()
        });
        let branches = self.refs.map(|connection| {
            connection
                .edges
                .into_iter()
                .map(|edge| BranchActivity {
                    name: edge.node.name,
                    commit_dates: edge
                        .node
                        .target
                        .unwrap_or_default()
                        .history
                        .edges
                        .into_iter()
                        .map(|commit| commit.node.committed_date)
                        .collect(),
                })
                .collect()
        });

        RepositoryNode {
            name: self.name,
            owner: OwnerInfo {
                login: self.owner.login,
            },
            is_private: self.is_private,
            topics,
            vulnerability_alerts,
            pull_requests,
            branches,
        }
    }
}

/// GitHub GraphQL client for the paged repository queries.
#[derive(Debug, Clone)]
pub struct GithubGraphqlClient {
    base_url: String,
    token: Option<String>,
    user_agent: String,
    client: Client,
}

impl GithubGraphqlClient {
    /// Build a GraphQL client from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| "https://api.github.com".to_string());
        let token = std::env::var("GITHUB_TOKEN").ok();
        let user_agent =
            std::env::var("GITHUB_USER_AGENT").unwrap_or_else(|_| "spyglass-cli".to_string());
        Self::new(base_url, token, user_agent)
    }

    /// Build a GraphQL client with explicit settings.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            user_agent: user_agent.into(),
            client: Client::new(),
        }
    }
}

impl PagedQuery for GithubGraphqlClient {
    fn fetch_page(&self, request: &PageRequest) -> Result<QueryPage> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| AuditError::Upstream("GITHUB_TOKEN is required".to_string()))?;
        let url = format!("{}/graphql", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "query": query_document(request.kind),
            "variables": {
                "org": request.org,
                "nth": request.page_size,
                "after": request.cursor,
            },
        });
        let response = self
            .client
            .post(url)
            .header("User-Agent", &self.user_agent)
            .bearer_auth(token)
            .json(&body)
            .send()
            .map_err(|err| AuditError::Upstream(format!("github request failed: {err}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(AuditError::Upstream(format!(
                "github api error ({status}): {body}"
            )));
        }
        let envelope: GraphqlEnvelope = response
            .json()
            .map_err(|err| AuditError::Upstream(format!("github response decode failed: {err}")))?;
        if let Some(error) = envelope.errors.first() {
            return Err(AuditError::Upstream(format!(
                "github graphql error: {}",
                error.message
            )));
        }
        let connection = envelope
            .data
            .ok_or_else(|| AuditError::Upstream("github response missing data".to_string()))?
            .organization
            .repositories;

        Ok(QueryPage {
            nodes: connection
                .nodes
                .into_iter()
                .map(WireRepository::into_node)
                .collect(),
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        })
    }
}

/// GitHub REST probe for the per-repository vulnerability-alerts toggle.
#[derive(Debug, Clone)]
pub struct GithubAlertProbe {
    base_url: String,
    token: Option<String>,
    user_agent: String,
    client: Client,
}

impl GithubAlertProbe {
    /// Build an alert probe from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| "https://api.github.com".to_string());
        let token = std::env::var("GITHUB_TOKEN").ok();
        let user_agent =
            std::env::var("GITHUB_USER_AGENT").unwrap_or_else(|_| "spyglass-cli".to_string());
        Self::new(base_url, token, user_agent)
    }

    /// Build an alert probe with explicit settings.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            user_agent: user_agent.into(),
            client: Client::new(),
        }
    }
}

impl AlertEndpoint for GithubAlertProbe {
    fn alerts_enabled(&self, owner: &str, name: &str) -> Result<bool> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| AuditError::Upstream("GITHUB_TOKEN is required".to_string()))?;
        let url = format!(
            "{}/repos/{owner}/{name}/vulnerability-alerts",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .bearer_auth(token)
            .send()
            .map_err(|err| AuditError::Upstream(format!("github request failed: {err}")))?;
        // 204 means the toggle is on; 404 means off. Anything else is a
        // real failure, not a disabled repository.
        match response.status().as_u16() {
            204 => Ok(true),
            404 => Ok(false),
            _ => {
                let status = response.status();
                let body = response.text().unwrap_or_default();
                Err(AuditError::Upstream(format!(
                    "github api error ({status}): {body}"
                )))
            }
        }
    }
}
