//! Report builder: display-ready route documents for the rendering layer.
//!
//! Every aggregate the renderer needs is pre-computed here so the view
//! never re-derives counts from the raw dataset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{RepositoryDataset, RepositoryIndex, RepositoryRecord, SEVERITIES, Visibility};
use crate::error::Result;
use crate::paths;
use crate::store::{DocumentStore, save_required};

/// Footer shared by every route document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteFooter {
    /// Run date the document was built from.
    pub updated: String,
}

/// Repository totals for the repositories-by-status overview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryTotals {
    /// Total repository count across all visibility buckets.
    pub all: usize,
    /// Repository count per visibility bucket.
    pub by_status: BTreeMap<String, usize>,
    /// The full dataset, bucketed by visibility.
    pub repos_by_status: RepositoryDataset,
}

/// Content payload of the repositories-by-status overview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoriesByStatusContent {
    /// Display title.
    pub title: String,
    /// Audited organization.
    pub org: String,
    /// Repository totals and the dataset itself.
    pub repositories: RepositoryTotals,
    /// Severity → repositories index.
    pub vulnerable_by_severity: RepositoryIndex,
}

/// The repositories-by-status overview document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoriesByStatusDocument {
    /// Display content.
    pub content: RepositoriesByStatusContent,
    /// Shared footer.
    pub footer: RouteFooter,
}

/// Alert-status counts per visibility bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertStatusCounts {
    /// Counts for public repositories, keyed by alert status.
    pub public: BTreeMap<String, usize>,
}

/// Vulnerability aggregates for the vulnerable-repositories overview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerableTotals {
    /// Severity labels in display order, most severe first.
    pub severities: Vec<String>,
    /// Total vulnerable repository count.
    pub all: usize,
    /// Vulnerable repository count per severity label.
    pub by_severity: BTreeMap<String, usize>,
    /// Severity → repositories index.
    pub repositories: RepositoryIndex,
}

/// Content payload of the vulnerable-repositories overview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerableRepositoriesContent {
    /// Display title.
    pub title: String,
    /// Audited organization.
    pub org: String,
    /// Vulnerability aggregates.
    pub vulnerable: VulnerableTotals,
    /// Alert-status counts, as published in `count_alert_status.json`.
    pub alert_status: AlertStatusCounts,
}

/// The vulnerable-repositories overview document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerableRepositoriesDocument {
    /// Display content.
    pub content: VulnerableRepositoriesContent,
    /// Shared footer.
    pub footer: RouteFooter,
}

/// Currency-band aggregates for the activity overview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTotals {
    /// Repository count per currency band.
    pub counts: BTreeMap<String, usize>,
    /// Repositories per currency band.
    pub repositories: BTreeMap<String, Vec<RepositoryRecord>>,
}

/// Content payload of the activity overview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityContent {
    /// Display title.
    pub title: String,
    /// Audited organization.
    pub org: String,
    /// Currency-band aggregates.
    pub activity: ActivityTotals,
}

/// The activity overview document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityDocument {
    /// Display content.
    pub content: ActivityContent,
    /// Shared footer.
    pub footer: RouteFooter,
}

/// Count entries per key of a keyed repository index.
pub fn count_types<T>(index: &BTreeMap<String, Vec<T>>) -> BTreeMap<String, usize> {
    index
        .iter()
        .map(|(key, values)| (key.clone(), values.len()))
        .collect()
}

/// Build every route document for a run.
pub fn build_route_data(store: &DocumentStore, org: &str, date: &str) -> Result<()> {
    build_repositories_by_status(store, org, date)?;
    build_alert_status_counts(store, date)?;
    build_vulnerable_repositories(store, org, date)?;
    build_activity_overview(store, org, date)?;
    Ok(())
}

/// Build `routes/overview_repositories_by_status.json`.
pub fn build_repositories_by_status(store: &DocumentStore, org: &str, date: &str) -> Result<()> {
    let dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());
    let vulnerable_by_severity: RepositoryIndex = store.read(
        &paths::vulnerable_by_severity(date),
        RepositoryIndex::new(),
    );

    let mut by_status = BTreeMap::new();
    by_status.insert(
        Visibility::Public.as_str().to_string(),
        dataset.public.len(),
    );
    by_status.insert(
        Visibility::Private.as_str().to_string(),
        dataset.private.len(),
    );

    let document = RepositoriesByStatusDocument {
        content: RepositoriesByStatusContent {
            title: "Overview - Repositories by status".to_string(),
            org: org.to_string(),
            repositories: RepositoryTotals {
                all: dataset.len(),
                by_status,
                repos_by_status: dataset,
            },
            vulnerable_by_severity,
        },
        footer: RouteFooter {
            updated: date.to_string(),
        },
    };
    save_required(
        store,
        &paths::route(date, "overview_repositories_by_status"),
        &document,
    )
}

/// Build `routes/count_alert_status.json`.
pub fn build_alert_status_counts(store: &DocumentStore, date: &str) -> Result<()> {
    let index: RepositoryIndex = store.read(&paths::alert_status(date), RepositoryIndex::new());
    let document = AlertStatusCounts {
        public: count_types(&index),
    };
    save_required(store, &paths::route(date, "count_alert_status"), &document)
}

/// Build `routes/overview_vulnerable_repositories.json`.
pub fn build_vulnerable_repositories(store: &DocumentStore, org: &str, date: &str) -> Result<()> {
    let alert_status: AlertStatusCounts = store.read(
        &paths::route(date, "count_alert_status"),
        AlertStatusCounts::default(),
    );
    let vulnerable_by_severity: RepositoryIndex = store.read(
        &paths::vulnerable_by_severity(date),
        RepositoryIndex::new(),
    );
    let by_severity = count_types(&vulnerable_by_severity);

    let document = VulnerableRepositoriesDocument {
        content: VulnerableRepositoriesContent {
            title: "Overview - Vulnerable repositories".to_string(),
            org: org.to_string(),
            vulnerable: VulnerableTotals {
                severities: SEVERITIES
                    .iter()
                    .map(|severity| severity.as_str().to_string())
                    .collect(),
                all: by_severity.values().sum(),
                by_severity,
                repositories: vulnerable_by_severity,
            },
            alert_status,
        },
        footer: RouteFooter {
            updated: date.to_string(),
        },
    };
    save_required(
        store,
        &paths::route(date, "overview_vulnerable_repositories"),
        &document,
    )
}

/// Build `routes/overview_activity.json` from annotated currency bands.
pub fn build_activity_overview(store: &DocumentStore, org: &str, date: &str) -> Result<()> {
    let dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());

    let mut totals = ActivityTotals::default();
    for repo in dataset.iter() {
        let Some(band) = repo.currency_band else {
            continue;
        };
        *totals.counts.entry(band.as_str().to_string()).or_insert(0) += 1;
        totals
            .repositories
            .entry(band.as_str().to_string())
            .or_default()
            .push(repo.clone());
    }

    let document = ActivityDocument {
        content: ActivityContent {
            title: "Overview - Activity".to_string(),
            org: org.to_string(),
            activity: totals,
        },
        footer: RouteFooter {
            updated: date.to_string(),
        },
    };
    save_required(store, &paths::route(date, "overview_activity"), &document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurrencyBand, Severity, VulnerabilityAlert};

    fn repo(name: &str) -> RepositoryRecord {
        RepositoryRecord {
            name: name.to_string(),
            ..RepositoryRecord::default()
        }
    }

    fn seeded_store() -> DocumentStore {
        let store = DocumentStore::in_memory();
        let mut vulnerable = repo("api");
        vulnerable.vulnerability_alerts = vec![VulnerabilityAlert {
            package: "leftpad".to_string(),
            severity: Severity::High,
            patched_version: None,
        }];
        let mut active = repo("site");
        active.currency_band = Some(CurrencyBand::WithinMonth);
        let dataset = RepositoryDataset {
            public: vec![vulnerable.clone(), active],
            private: vec![repo("internal")],
        };
        assert!(store.save(&paths::repositories("2024-06-01"), &dataset));

        let mut severity_index = RepositoryIndex::new();
        severity_index.insert("high".to_string(), vec![vulnerable]);
        assert!(store.save(
            &paths::vulnerable_by_severity("2024-06-01"),
            &severity_index
        ));

        let mut alert_index = RepositoryIndex::new();
        alert_index.insert("clean".to_string(), vec![repo("site")]);
        assert!(store.save(&paths::alert_status("2024-06-01"), &alert_index));
        store
    }

    #[test]
    fn repositories_by_status_counts_both_buckets() {
        let store = seeded_store();
        build_repositories_by_status(&store, "acme", "2024-06-01").expect("build");

        let document: RepositoriesByStatusDocument = store.read(
            &paths::route("2024-06-01", "overview_repositories_by_status"),
            RepositoriesByStatusDocument::default(),
        );
        assert_eq!(document.content.repositories.all, 3);
        assert_eq!(document.content.repositories.by_status["public"], 2);
        assert_eq!(document.content.repositories.by_status["private"], 1);
        assert_eq!(document.footer.updated, "2024-06-01");
    }

    #[test]
    fn alert_status_counts_follow_the_index() {
        let store = seeded_store();
        build_alert_status_counts(&store, "2024-06-01").expect("build");

        let document: AlertStatusCounts = store.read(
            &paths::route("2024-06-01", "count_alert_status"),
            AlertStatusCounts::default(),
        );
        assert_eq!(document.public["clean"], 1);
    }

    #[test]
    fn vulnerable_overview_totals_and_orders_severities() {
        let store = seeded_store();
        build_alert_status_counts(&store, "2024-06-01").expect("build");
        build_vulnerable_repositories(&store, "acme", "2024-06-01").expect("build");

        let document: VulnerableRepositoriesDocument = store.read(
            &paths::route("2024-06-01", "overview_vulnerable_repositories"),
            VulnerableRepositoriesDocument::default(),
        );
        assert_eq!(document.content.vulnerable.all, 1);
        assert_eq!(document.content.vulnerable.by_severity["high"], 1);
        assert_eq!(
            document.content.vulnerable.severities,
            vec!["critical", "high", "moderate", "low"]
        );
        assert_eq!(document.content.alert_status.public["clean"], 1);
    }

    #[test]
    fn activity_overview_buckets_by_currency_band() {
        let store = seeded_store();
        build_activity_overview(&store, "acme", "2024-06-01").expect("build");

        let document: ActivityDocument = store.read(
            &paths::route("2024-06-01", "overview_activity"),
            ActivityDocument::default(),
        );
        assert_eq!(document.content.activity.counts["within a month"], 1);
        assert_eq!(
            document.content.activity.repositories["within a month"][0].name,
            "site"
        );
    }

    #[test]
    fn build_route_data_writes_every_document() {
        let store = seeded_store();
        build_route_data(&store, "acme", "2024-06-01").expect("build");
        for name in [
            "overview_repositories_by_status",
            "count_alert_status",
            "overview_vulnerable_repositories",
            "overview_activity",
        ] {
            let value: serde_json::Value =
                store.read(&paths::route("2024-06-01", name), serde_json::Value::Null);
            assert!(!value.is_null(), "route {name} missing");
        }
    }
}
