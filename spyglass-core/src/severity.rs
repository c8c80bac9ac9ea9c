//! Vulnerability severity grouping and patch recommendations.

use std::collections::BTreeMap;

use crate::domain::{
    PatchRecommendation, RepositoryDataset, RepositoryIndex, RepositoryRecord, Severity,
};
use crate::error::Result;
use crate::paths;
use crate::store::{DocumentStore, save_required};

/// Highest severity among a repository's open vulnerability alerts.
pub fn max_severity(repo: &RepositoryRecord) -> Option<Severity> {
    repo.vulnerability_alerts
        .iter()
        .map(|alert| alert.severity)
        .max_by_key(|severity| severity.rank())
}

/// Patch recommendations for every alert that has a patched version.
pub fn patch_list(repo: &RepositoryRecord) -> Vec<PatchRecommendation> {
    repo.vulnerability_alerts
        .iter()
        .filter_map(|alert| {
            alert
                .patched_version
                .as_ref()
                .map(|version| PatchRecommendation {
                    package: alert.package.clone(),
                    patched_version: version.clone(),
                })
        })
        .collect()
}

/// Open vulnerability counts per severity label for one repository.
pub fn severity_counts(repo: &RepositoryRecord) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for alert in &repo.vulnerability_alerts {
        *counts.entry(alert.severity.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Group vulnerable repositories under their maximum severity label.
pub fn group_by_severity(vulnerable: &[RepositoryRecord]) -> RepositoryIndex {
    let mut index = RepositoryIndex::new();
    for repo in vulnerable {
        if let Some(severity) = max_severity(repo) {
            index
                .entry(severity.as_str().to_string())
                .or_default()
                .push(repo.clone());
        }
    }
    index
}

/// Build the severity → repositories index and annotate every vulnerable
/// public repository with its maximum severity, patch recommendations, and
/// per-severity counts.
pub fn analyse_vulnerabilities(store: &DocumentStore, date: &str) -> Result<()> {
    let mut dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());
    if dataset.is_empty() {
        log::warn!("no repository dataset for {date}; nothing to analyse");
        return Ok(());
    }

    let vulnerable: Vec<RepositoryRecord> = dataset
        .public
        .iter()
        .filter(|repo| !repo.vulnerability_alerts.is_empty())
        .cloned()
        .collect();
    let index = group_by_severity(&vulnerable);
    save_required(store, &paths::vulnerable_by_severity(date), &index)?;

    for repo in dataset.public.iter_mut() {
        let Some(severity) = max_severity(repo) else {
            continue;
        };
        repo.max_severity = Some(severity);
        repo.patches = patch_list(repo);
        repo.vulnerability_counts = Some(severity_counts(repo));
    }

    save_required(store, &paths::repositories(date), &dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VulnerabilityAlert;

    fn alert(package: &str, severity: Severity, patched: Option<&str>) -> VulnerabilityAlert {
        VulnerabilityAlert {
            package: package.to_string(),
            severity,
            patched_version: patched.map(str::to_string),
        }
    }

    fn vulnerable_repo(name: &str, alerts: Vec<VulnerabilityAlert>) -> RepositoryRecord {
        RepositoryRecord {
            name: name.to_string(),
            vulnerability_alerts: alerts,
            ..RepositoryRecord::default()
        }
    }

    #[test]
    fn max_severity_follows_the_fixed_order() {
        let repo = vulnerable_repo(
            "api",
            vec![
                alert("a", Severity::Low, None),
                alert("b", Severity::Critical, None),
                alert("c", Severity::Moderate, None),
            ],
        );
        assert_eq!(max_severity(&repo), Some(Severity::Critical));
    }

    #[test]
    fn patch_list_skips_unpatched_alerts() {
        let repo = vulnerable_repo(
            "api",
            vec![
                alert("fixable", Severity::High, Some("2.0.0")),
                alert("stuck", Severity::High, None),
            ],
        );
        let patches = patch_list(&repo);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].package, "fixable");
        assert_eq!(patches[0].patched_version, "2.0.0");
    }

    #[test]
    fn grouping_keys_by_max_severity_label() {
        let repos = vec![
            vulnerable_repo("worst", vec![alert("a", Severity::Critical, None)]),
            vulnerable_repo("mild", vec![alert("b", Severity::Low, None)]),
        ];
        let index = group_by_severity(&repos);
        assert_eq!(index["critical"][0].name, "worst");
        assert_eq!(index["low"][0].name, "mild");
    }

    #[test]
    fn analysis_annotates_vulnerable_repositories_in_place() {
        let store = DocumentStore::in_memory();
        let dataset = RepositoryDataset {
            public: vec![
                vulnerable_repo(
                    "api",
                    vec![
                        alert("leftpad", Severity::High, Some("1.0.1")),
                        alert("rightpad", Severity::Moderate, None),
                    ],
                ),
                vulnerable_repo("clean", Vec::new()),
            ],
            private: Vec::new(),
        };
        assert!(store.save(&paths::repositories("2024-06-01"), &dataset));

        analyse_vulnerabilities(&store, "2024-06-01").expect("analyse");

        let index: RepositoryIndex = store.read(
            &paths::vulnerable_by_severity("2024-06-01"),
            RepositoryIndex::new(),
        );
        assert_eq!(index["high"].len(), 1);

        let updated: RepositoryDataset =
            store.read(&paths::repositories("2024-06-01"), RepositoryDataset::default());
        let api = &updated.public[0];
        assert_eq!(api.max_severity, Some(Severity::High));
        assert_eq!(api.patches.len(), 1);
        assert_eq!(
            api.vulnerability_counts.as_ref().map(|counts| counts["high"]),
            Some(1)
        );
        assert!(updated.public[1].max_severity.is_none());
    }
}
