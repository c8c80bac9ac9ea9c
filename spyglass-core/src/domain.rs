//! Domain entities for Spyglass audit runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visibility bucket a repository belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Publicly visible repository.
    Public,
    /// Private repository.
    Private,
}

impl Visibility {
    /// Human-readable bucket label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

/// Repository owner metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerInfo {
    /// Owner login name.
    pub login: String,
}

/// Vulnerability severity labels, ordered from most to least severe.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Critical severity.
    Critical,
    /// High severity.
    High,
    /// Moderate severity.
    Moderate,
    /// Low severity.
    Low,
}

/// Severity labels in display order, most severe first.
pub const SEVERITIES: [Severity; 4] = [
    Severity::Critical,
    Severity::High,
    Severity::Moderate,
    Severity::Low,
];

impl Severity {
    /// Human-readable severity label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Moderate => "moderate",
            Severity::Low => "low",
        }
    }

    /// Numeric rank, higher is more severe.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 3,
            Severity::High => 2,
            Severity::Moderate => 1,
            Severity::Low => 0,
        }
    }

    /// Parse a severity label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "moderate" | "medium" => Some(Severity::Moderate),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

/// An open vulnerability alert against a repository dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityAlert {
    /// Affected package name.
    pub package: String,
    /// Advisory severity.
    pub severity: Severity,
    /// First patched version, if the advisory has a fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patched_version: Option<String>,
}

/// A patch recommendation derived from an open vulnerability alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRecommendation {
    /// Affected package name.
    pub package: String,
    /// Version that resolves the advisory.
    pub patched_version: String,
}

/// Recency band for the most recent commit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencyBand {
    /// Last commit within the last 28 days.
    #[serde(rename = "within a month")]
    WithinMonth,
    /// Last commit within the last 91 days.
    #[serde(rename = "within a quarter")]
    WithinQuarter,
    /// Last commit within the last 365 days.
    #[serde(rename = "within a year")]
    WithinYear,
    /// Last commit more than a year ago.
    #[serde(rename = "older")]
    Older,
}

impl CurrencyBand {
    /// Human-readable band label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencyBand::WithinMonth => "within a month",
            CurrencyBand::WithinQuarter => "within a quarter",
            CurrencyBand::WithinYear => "within a year",
            CurrencyBand::Older => "older",
        }
    }

    /// Band for a number of days since the last commit. Bounds are inclusive
    /// of the lower band: 28 days is still "within a month".
    pub fn from_days(days: i64) -> Self {
        if days <= 28 {
            CurrencyBand::WithinMonth
        } else if days <= 91 {
            CurrencyBand::WithinQuarter
        } else if days <= 365 {
            CurrencyBand::WithinYear
        } else {
            CurrencyBand::Older
        }
    }
}

/// Advisory-alert classification for a repository.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Repository has at least one open vulnerability alert.
    Vulnerable,
    /// Alerts are enabled and no vulnerabilities are open.
    Clean,
    /// Alerts are disabled.
    Disabled,
}

impl AlertStatus {
    /// Human-readable status label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Vulnerable => "vulnerable",
            AlertStatus::Clean => "clean",
            AlertStatus::Disabled => "disabled",
        }
    }
}

/// A repository record, annotated by the classifiers as a run progresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryRecord {
    /// Repository name, unique within a visibility bucket.
    pub name: String,
    /// Repository owner.
    pub owner: OwnerInfo,
    /// Topic labels attached to the repository.
    pub topics: Vec<String>,
    /// Open vulnerability alerts fetched with the repository metadata.
    pub vulnerability_alerts: Vec<VulnerabilityAlert>,
    /// Whether security advisories are enabled. Unset until the advisory
    /// phase resolves it or carries it forward from the previous run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_advisories_enabled_status: Option<bool>,
    /// Whether the dependency bot is active. Set only for repositories the
    /// bot reports as active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependabot_enabled_status: Option<bool>,
    /// Owning team, derived from topics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// Highest open vulnerability severity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_severity: Option<Severity>,
    /// Patch recommendations for open vulnerabilities.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<PatchRecommendation>,
    /// Open vulnerability counts by severity label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerability_counts: Option<BTreeMap<String, usize>>,
    /// Human-readable recency of the most recent pull request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_pull_request_status: Option<String>,
    /// Whole days since the most recent commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_commit_days_ago: Option<i64>,
    /// Average whole days between commits over the repository lifetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_commit_frequency: Option<i64>,
    /// Whether the repository counts as actively maintained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    /// Recency band for the most recent commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_band: Option<CurrencyBand>,
}

/// Summary of a single pull request, in upstream edge order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestSummary {
    /// Whether the pull request was merged.
    pub merged: bool,
    /// Whether the pull request was closed without merging.
    pub closed: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Merge timestamp, if merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    /// Close timestamp, if closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Commit timestamps for a single branch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchActivity {
    /// Branch name.
    pub name: String,
    /// Commit timestamps on the branch, in upstream order.
    pub commit_dates: Vec<DateTime<Utc>>,
}

/// Per-repository branch/commit activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryActivity {
    /// Branches with their commit history.
    pub branches: Vec<BranchActivity>,
}

/// A repository-shaped record yielded by the paged query client. Only the
/// sections requested by the query kind are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryNode {
    /// Repository name.
    pub name: String,
    /// Repository owner.
    pub owner: OwnerInfo,
    /// Whether the repository is private.
    pub is_private: bool,
    /// Topic labels.
    pub topics: Vec<String>,
    /// Open vulnerability alerts.
    pub vulnerability_alerts: Vec<VulnerabilityAlert>,
    /// Pull requests, most recent first (activity query only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_requests: Option<Vec<PullRequestSummary>>,
    /// Branch activity (refs query only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<BranchActivity>>,
}

/// The run-scoped repository dataset, bucketed by visibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryDataset {
    /// Public repositories, in fetch order.
    pub public: Vec<RepositoryRecord>,
    /// Private repositories, in fetch order.
    pub private: Vec<RepositoryRecord>,
}

impl RepositoryDataset {
    /// Group fetched nodes into visibility buckets, preserving fetch order.
    pub fn from_nodes(nodes: Vec<RepositoryNode>) -> Self {
        let mut dataset = RepositoryDataset::default();
        for node in nodes {
            let record = RepositoryRecord {
                name: node.name,
                owner: node.owner,
                topics: node.topics,
                vulnerability_alerts: node.vulnerability_alerts,
                ..RepositoryRecord::default()
            };
            if node.is_private {
                dataset.private.push(record);
            } else {
                dataset.public.push(record);
            }
        }
        dataset
    }

    /// Whether the dataset holds no repositories at all.
    pub fn is_empty(&self) -> bool {
        self.public.is_empty() && self.private.is_empty()
    }

    /// Total repository count across both buckets.
    pub fn len(&self) -> usize {
        self.public.len() + self.private.len()
    }

    /// Iterate every repository across both buckets.
    pub fn iter(&self) -> impl Iterator<Item = &RepositoryRecord> {
        self.public.iter().chain(self.private.iter())
    }

    /// Iterate every repository mutably across both buckets.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RepositoryRecord> {
        self.public.iter_mut().chain(self.private.iter_mut())
    }
}

/// Status-label → repositories index, written as `alert_status.json` and
/// `vulnerable_by_severity.json`.
pub type RepositoryIndex = BTreeMap<String, Vec<RepositoryRecord>>;

/// Per-repository activity document, keyed by repository name.
pub type ActivityRefsDocument = BTreeMap<String, RepositoryActivity>;

/// Per-repository pull request document, keyed by repository name.
pub type ActivityPrsDocument = BTreeMap<String, Vec<PullRequestSummary>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_rank_orders_labels() {
        assert!(Severity::Critical.rank() > Severity::High.rank());
        assert!(Severity::High.rank() > Severity::Moderate.rank());
        assert!(Severity::Moderate.rank() > Severity::Low.rank());
    }

    #[test]
    fn severity_parses_labels_case_insensitively() {
        assert_eq!(Severity::from_label("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::from_label("medium"), Some(Severity::Moderate));
        assert_eq!(Severity::from_label("unknown"), None);
    }

    #[test]
    fn currency_band_bounds_are_inclusive_of_lower_band() {
        assert_eq!(CurrencyBand::from_days(20), CurrencyBand::WithinMonth);
        assert_eq!(CurrencyBand::from_days(28), CurrencyBand::WithinMonth);
        assert_eq!(CurrencyBand::from_days(60), CurrencyBand::WithinQuarter);
        assert_eq!(CurrencyBand::from_days(91), CurrencyBand::WithinQuarter);
        assert_eq!(CurrencyBand::from_days(200), CurrencyBand::WithinYear);
        assert_eq!(CurrencyBand::from_days(365), CurrencyBand::WithinYear);
        assert_eq!(CurrencyBand::from_days(400), CurrencyBand::Older);
    }

    #[test]
    fn dataset_groups_nodes_by_visibility() {
        let nodes = vec![
            RepositoryNode {
                name: "open".to_string(),
                ..RepositoryNode::default()
            },
            RepositoryNode {
                name: "hidden".to_string(),
                is_private: true,
                ..RepositoryNode::default()
            },
        ];
        let dataset = RepositoryDataset::from_nodes(nodes);
        assert_eq!(dataset.public.len(), 1);
        assert_eq!(dataset.private.len(), 1);
        assert_eq!(dataset.public[0].name, "open");
        assert_eq!(dataset.private[0].name, "hidden");
        assert_eq!(dataset.len(), 2);
        assert!(!dataset.is_empty());
    }

    #[test]
    fn record_serializes_with_camel_case_keys() {
        let mut record = RepositoryRecord {
            name: "demo".to_string(),
            ..RepositoryRecord::default()
        };
        record.security_advisories_enabled_status = Some(true);
        record.currency_band = Some(CurrencyBand::WithinMonth);
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["securityAdvisoriesEnabledStatus"], true);
        assert_eq!(json["currencyBand"], "within a month");
        assert!(json.get("maxSeverity").is_none());
    }
}
