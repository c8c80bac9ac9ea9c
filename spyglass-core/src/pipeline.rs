//! Audit orchestration: phases, soft failures, and named tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::advisories::{self, AlertEndpoint};
use crate::dependabot::{self, DependabotService};
use crate::domain::{ActivityPrsDocument, ActivityRefsDocument, RepositoryActivity, RepositoryDataset};
use crate::error::Result;
use crate::history;
use crate::paths;
use crate::query::{self, PagedQuery, QueryKind};
use crate::store::{DocumentStore, save_required};
use crate::{activity, ownership, routes, severity, teams};

/// Audit phases, in execution order.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
    /// Fetch the repository metadata dataset.
    FetchRepositories,
    /// Fetch branch/commit activity.
    FetchActivityRefs,
    /// Fetch pull request activity.
    FetchActivityPullRequests,
    /// Fetch dependency-bot status.
    FetchDependabot,
    /// Resolve advisory-alert status (cold or warm).
    ResolveAdvisories,
    /// Build ownership/topic indices.
    AnalyseOwnership,
    /// Classify pull-request recency.
    AnalysePullRequests,
    /// Classify commit activity and currency bands.
    AnalyseCommitActivity,
    /// Group vulnerabilities and recommend patches.
    AnalyseVulnerabilities,
    /// Assign team membership from topics.
    AnalyseTeams,
    /// Build the route documents for the rendering layer.
    BuildRoutes,
}

/// Every phase, in the fixed dependency order of a full run.
pub const ALL_PHASES: [AuditPhase; 11] = [
    AuditPhase::FetchRepositories,
    AuditPhase::FetchActivityRefs,
    AuditPhase::FetchActivityPullRequests,
    AuditPhase::FetchDependabot,
    AuditPhase::ResolveAdvisories,
    AuditPhase::AnalyseOwnership,
    AuditPhase::AnalysePullRequests,
    AuditPhase::AnalyseCommitActivity,
    AuditPhase::AnalyseVulnerabilities,
    AuditPhase::AnalyseTeams,
    AuditPhase::BuildRoutes,
];

impl AuditPhase {
    /// Human-readable phase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditPhase::FetchRepositories => "fetch_repositories",
            AuditPhase::FetchActivityRefs => "fetch_activity_refs",
            AuditPhase::FetchActivityPullRequests => "fetch_activity_pull_requests",
            AuditPhase::FetchDependabot => "fetch_dependabot",
            AuditPhase::ResolveAdvisories => "resolve_advisories",
            AuditPhase::AnalyseOwnership => "analyse_ownership",
            AuditPhase::AnalysePullRequests => "analyse_pull_requests",
            AuditPhase::AnalyseCommitActivity => "analyse_commit_activity",
            AuditPhase::AnalyseVulnerabilities => "analyse_vulnerabilities",
            AuditPhase::AnalyseTeams => "analyse_teams",
            AuditPhase::BuildRoutes => "build_routes",
        }
    }
}

/// Phase outcome status values.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Phase completed and wrote its documents.
    Success,
    /// Phase failed; its documents were not written. The run continues.
    Failed,
}

impl PhaseStatus {
    /// Human-readable status label.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Success => "success",
            PhaseStatus::Failed => "failed",
        }
    }
}

/// Captures the outcome of a single audit phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseOutcome {
    /// Phase identifier.
    pub phase: AuditPhase,
    /// Phase status.
    pub status: PhaseStatus,
    /// Optional detail or error message.
    pub detail: Option<String>,
}

/// Result of one orchestrator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRunResult {
    /// Run date.
    pub date: String,
    /// Overall status: success only when every phase succeeded.
    pub status: PhaseStatus,
    /// Per-phase outcomes, in execution order.
    pub phases: Vec<PhaseOutcome>,
}

/// Named tasks for selective phase re-runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuditTask {
    /// Re-fetch the repository dataset.
    RepositoryStatus,
    /// Re-fetch branch and pull request activity.
    GetActivity,
    /// Re-fetch dependency-bot status.
    Dependabot,
    /// Re-resolve advisory-alert status.
    Advisories,
    /// Rebuild ownership indices and team membership.
    Membership,
    /// Re-run the activity classifiers.
    AnalyseActivity,
    /// Re-run vulnerability grouping and patch recommendations.
    Patch,
    /// Rebuild the route documents.
    Routes,
}

impl AuditTask {
    /// Task name as used on the invocation surface.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditTask::RepositoryStatus => "repository-status",
            AuditTask::GetActivity => "get-activity",
            AuditTask::Dependabot => "dependabot",
            AuditTask::Advisories => "advisories",
            AuditTask::Membership => "membership",
            AuditTask::AnalyseActivity => "analyse-activity",
            AuditTask::Patch => "patch",
            AuditTask::Routes => "routes",
        }
    }

    /// Parse a task name from the invocation surface.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "repository-status" => Some(AuditTask::RepositoryStatus),
            "get-activity" => Some(AuditTask::GetActivity),
            "dependabot" => Some(AuditTask::Dependabot),
            "advisories" => Some(AuditTask::Advisories),
            "membership" => Some(AuditTask::Membership),
            "analyse-activity" => Some(AuditTask::AnalyseActivity),
            "patch" => Some(AuditTask::Patch),
            "routes" => Some(AuditTask::Routes),
            _ => None,
        }
    }

    /// Phases the task runs, in order.
    pub fn phases(&self) -> &'static [AuditPhase] {
        match self {
            AuditTask::RepositoryStatus => &[AuditPhase::FetchRepositories],
            AuditTask::GetActivity => &[
                AuditPhase::FetchActivityRefs,
                AuditPhase::FetchActivityPullRequests,
            ],
            AuditTask::Dependabot => &[AuditPhase::FetchDependabot],
            AuditTask::Advisories => &[AuditPhase::ResolveAdvisories],
            AuditTask::Membership => &[AuditPhase::AnalyseOwnership, AuditPhase::AnalyseTeams],
            AuditTask::AnalyseActivity => &[
                AuditPhase::AnalysePullRequests,
                AuditPhase::AnalyseCommitActivity,
            ],
            AuditTask::Patch => &[AuditPhase::AnalyseVulnerabilities],
            AuditTask::Routes => &[AuditPhase::BuildRoutes],
        }
    }
}

/// Shared upstream client set.
#[derive(Clone)]
pub struct AuditClients {
    query: Arc<dyn PagedQuery + Send + Sync>,
    alerts: Arc<dyn AlertEndpoint + Send + Sync>,
    dependabot: Arc<dyn DependabotService + Send + Sync>,
}

impl AuditClients {
    /// Build a client set from explicit implementations.
    pub fn new(
        query: Arc<dyn PagedQuery + Send + Sync>,
        alerts: Arc<dyn AlertEndpoint + Send + Sync>,
        dependabot: Arc<dyn DependabotService + Send + Sync>,
    ) -> Self {
        Self {
            query,
            alerts,
            dependabot,
        }
    }
}

/// Configuration for an audit run.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Organization to audit.
    pub org: String,
    /// Page size for metadata and pull request queries.
    pub page_size: u32,
    /// Page size for the heavier refs/commits query.
    pub refs_page_size: u32,
    /// Fixed delay after each advisory-alert probe.
    pub alert_throttle: Duration,
    /// Path of the team definitions file.
    pub teams_file: PathBuf,
}

impl AuditConfig {
    /// Configuration with default page sizes and throttle.
    pub fn new(org: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            page_size: 100,
            refs_page_size: 50,
            alert_throttle: Duration::from_millis(200),
            teams_file: PathBuf::from("teams.json"),
        }
    }
}

/// Drives audit runs over a document store and upstream clients.
///
/// Phases run strictly in sequence. A failing phase records its outcome
/// and the run continues: a partial audit is more useful than none, and
/// every phase is independently re-runnable through a named task.
pub struct AuditRunner {
    clients: AuditClients,
    config: AuditConfig,
}

impl AuditRunner {
    /// Build a runner with explicit clients and configuration.
    pub fn new(clients: AuditClients, config: AuditConfig) -> Self {
        Self { clients, config }
    }

    /// Execute a full audit run for the given date.
    ///
    /// Marks the run in-progress in the history ledger on entry. The run
    /// is marked complete and published as current only when the
    /// BuildRoutes phase succeeded; otherwise the ledger entry stays
    /// in-progress for a later `routes` task re-run.
    pub fn run(&self, store: &DocumentStore, date: &str) -> AuditRunResult {
        let mut ledger = history::load(store);
        ledger.mark_in_progress(date);
        if !history::save(store, &ledger) {
            log::warn!("failed to record run start for {date}");
        }

        let mut phases = Vec::new();
        for phase in ALL_PHASES {
            phases.push(self.execute_phase(store, date, phase));
        }

        let routes_built = phases.iter().any(|outcome| {
            outcome.phase == AuditPhase::BuildRoutes && outcome.status == PhaseStatus::Success
        });
        if routes_built {
            let mut ledger = history::load(store);
            ledger.mark_complete(date);
            if !history::save(store, &ledger) {
                log::warn!("failed to publish run {date}");
            }
        } else {
            log::warn!("run {date} left in progress; route documents were not built");
        }

        AuditRunResult {
            date: date.to_string(),
            status: overall_status(&phases),
            phases,
        }
    }

    /// Execute a single named task for the given date, without touching
    /// the history ledger.
    pub fn run_task(&self, store: &DocumentStore, task: AuditTask, date: &str) -> AuditRunResult {
        let phases: Vec<PhaseOutcome> = task
            .phases()
            .iter()
            .map(|phase| self.execute_phase(store, date, *phase))
            .collect();
        AuditRunResult {
            date: date.to_string(),
            status: overall_status(&phases),
            phases,
        }
    }

    fn execute_phase(&self, store: &DocumentStore, date: &str, phase: AuditPhase) -> PhaseOutcome {
        log::info!("running phase {}", phase.as_str());
        match self.run_phase(store, date, phase) {
            Ok(detail) => PhaseOutcome {
                phase,
                status: PhaseStatus::Success,
                detail,
            },
            Err(err) => {
                log::warn!("phase {} failed: {err}", phase.as_str());
                PhaseOutcome {
                    phase,
                    status: PhaseStatus::Failed,
                    detail: Some(err.to_string()),
                }
            }
        }
    }

    fn run_phase(
        &self,
        store: &DocumentStore,
        date: &str,
        phase: AuditPhase,
    ) -> Result<Option<String>> {
        match phase {
            AuditPhase::FetchRepositories => {
                let nodes = query::fetch_all(
                    self.clients.query.as_ref(),
                    QueryKind::Repositories,
                    &self.config.org,
                    self.config.page_size,
                )?;
                let dataset = RepositoryDataset::from_nodes(nodes);
                let total = dataset.len();
                save_required(store, &paths::repositories(date), &dataset)?;
                Ok(Some(format!("stored {total} repositories")))
            }
            AuditPhase::FetchActivityRefs => {
                let nodes = query::fetch_all(
                    self.clients.query.as_ref(),
                    QueryKind::ActivityRefs,
                    &self.config.org,
                    self.config.refs_page_size,
                )?;
                let document: ActivityRefsDocument = nodes
                    .into_iter()
                    .map(|node| {
                        let activity = RepositoryActivity {
                            branches: node.branches.unwrap_or_default(),
                        };
                        (node.name, activity)
                    })
                    .collect();
                let total = document.len();
                save_required(store, &paths::activity_refs(date), &document)?;
                Ok(Some(format!("stored branch activity for {total} repositories")))
            }
            AuditPhase::FetchActivityPullRequests => {
                let nodes = query::fetch_all(
                    self.clients.query.as_ref(),
                    QueryKind::ActivityPullRequests,
                    &self.config.org,
                    self.config.page_size,
                )?;
                let document: ActivityPrsDocument = nodes
                    .into_iter()
                    .map(|node| (node.name, node.pull_requests.unwrap_or_default()))
                    .collect();
                let total = document.len();
                save_required(store, &paths::activity_prs(date), &document)?;
                Ok(Some(format!(
                    "stored pull request activity for {total} repositories"
                )))
            }
            AuditPhase::FetchDependabot => {
                dependabot::fetch_dependabot_status(
                    store,
                    self.clients.dependabot.as_ref(),
                    &self.config.org,
                    date,
                )?;
                Ok(None)
            }
            AuditPhase::ResolveAdvisories => {
                let ledger = history::load(store);
                match ledger.current {
                    Some(baseline) => {
                        advisories::resolve_warm(
                            store,
                            self.clients.alerts.as_ref(),
                            date,
                            &baseline,
                            self.config.alert_throttle,
                        )?;
                        Ok(Some(format!("diffed against baseline {baseline}")))
                    }
                    None => {
                        advisories::resolve_cold(
                            store,
                            self.clients.alerts.as_ref(),
                            date,
                            self.config.alert_throttle,
                        )?;
                        Ok(Some("cold resolution, no baseline".to_string()))
                    }
                }
            }
            AuditPhase::AnalyseOwnership => {
                ownership::analyse_repo_ownership(store, date)?;
                Ok(None)
            }
            AuditPhase::AnalysePullRequests => {
                activity::analyse_pull_requests(store, date, Utc::now())?;
                Ok(None)
            }
            AuditPhase::AnalyseCommitActivity => {
                activity::analyse_commit_activity(store, date, Utc::now())?;
                Ok(None)
            }
            AuditPhase::AnalyseVulnerabilities => {
                severity::analyse_vulnerabilities(store, date)?;
                Ok(None)
            }
            AuditPhase::AnalyseTeams => {
                teams::analyse_team_membership(store, date, &self.config.teams_file)?;
                Ok(None)
            }
            AuditPhase::BuildRoutes => {
                routes::build_route_data(store, &self.config.org, date)?;
                Ok(None)
            }
        }
    }
}

fn overall_status(phases: &[PhaseOutcome]) -> PhaseStatus {
    if phases
        .iter()
        .all(|outcome| outcome.status == PhaseStatus::Success)
    {
        PhaseStatus::Success
    } else {
        PhaseStatus::Failed
    }
}
