//! Dependency-bot status fetch and dataset annotation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::RepositoryDataset;
use crate::error::Result;
use crate::paths;
use crate::store::{DocumentStore, save_required};

/// Abstraction over the dependency-bot status service.
#[cfg_attr(test, mockall::automock)]
pub trait DependabotService {
    /// Repository names grouped by bot status for the organization.
    fn repos_by_status(&self, org: &str) -> Result<BTreeMap<String, Vec<String>>>;
}

/// The persisted dependency-bot status document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependabotStatusDocument {
    /// Repository count per status label.
    pub counts: BTreeMap<String, usize>,
    /// Repository names per status label.
    pub repositories: BTreeMap<String, Vec<String>>,
}

/// Fetch the bot status map, persist it with per-status counts, and mark
/// repositories whose status is exactly `active` as dependabot-enabled.
/// Repositories under any other status are left unset.
pub fn fetch_dependabot_status(
    store: &DocumentStore,
    service: &dyn DependabotService,
    org: &str,
    date: &str,
) -> Result<()> {
    let repositories = service.repos_by_status(org)?;
    let counts = repositories
        .iter()
        .map(|(status, repos)| (status.clone(), repos.len()))
        .collect();
    let document = DependabotStatusDocument {
        counts,
        repositories,
    };
    save_required(store, &paths::dependabot_status(date), &document)?;

    let mut dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());
    if dataset.is_empty() {
        log::warn!("no repository dataset for {date}; skipping dependabot annotation");
        return Ok(());
    }
    let active = document
        .repositories
        .get("active")
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    for repo in dataset.public.iter_mut() {
        if active.iter().any(|name| name == &repo.name) {
            repo.dependabot_enabled_status = Some(true);
        }
    }

    save_required(store, &paths::repositories(date), &dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepositoryRecord;

    fn repo(name: &str) -> RepositoryRecord {
        RepositoryRecord {
            name: name.to_string(),
            ..RepositoryRecord::default()
        }
    }

    #[test]
    fn only_active_repositories_are_marked_enabled() {
        let store = DocumentStore::in_memory();
        let dataset = RepositoryDataset {
            public: vec![repo("api"), repo("site"), repo("tool")],
            private: Vec::new(),
        };
        assert!(store.save(&paths::repositories("2024-06-01"), &dataset));

        let mut service = MockDependabotService::new();
        service.expect_repos_by_status().returning(|_| {
            let mut map = BTreeMap::new();
            map.insert("active".to_string(), vec!["api".to_string()]);
            map.insert("paused".to_string(), vec!["site".to_string()]);
            Ok(map)
        });

        fetch_dependabot_status(&store, &service, "acme", "2024-06-01").expect("fetch");

        let updated: RepositoryDataset =
            store.read(&paths::repositories("2024-06-01"), RepositoryDataset::default());
        assert_eq!(updated.public[0].dependabot_enabled_status, Some(true));
        assert_eq!(updated.public[1].dependabot_enabled_status, None);
        assert_eq!(updated.public[2].dependabot_enabled_status, None);
    }

    #[test]
    fn status_document_carries_counts() {
        let store = DocumentStore::in_memory();
        assert!(store.save(
            &paths::repositories("2024-06-01"),
            &RepositoryDataset {
                public: vec![repo("api")],
                private: Vec::new(),
            }
        ));

        let mut service = MockDependabotService::new();
        service.expect_repos_by_status().returning(|_| {
            let mut map = BTreeMap::new();
            map.insert(
                "active".to_string(),
                vec!["api".to_string(), "site".to_string()],
            );
            Ok(map)
        });

        fetch_dependabot_status(&store, &service, "acme", "2024-06-01").expect("fetch");

        let document: DependabotStatusDocument = store.read(
            &paths::dependabot_status("2024-06-01"),
            DependabotStatusDocument::default(),
        );
        assert_eq!(document.counts["active"], 2);
    }

    #[test]
    fn service_failure_propagates_without_writing() {
        let store = DocumentStore::in_memory();
        let mut service = MockDependabotService::new();
        service
            .expect_repos_by_status()
            .returning(|_| Err(crate::error::AuditError::Upstream("down".to_string())));

        let result = fetch_dependabot_status(&store, &service, "acme", "2024-06-01");
        assert!(result.is_err());
        let document: DependabotStatusDocument = store.read(
            &paths::dependabot_status("2024-06-01"),
            DependabotStatusDocument::default(),
        );
        assert!(document.repositories.is_empty());
    }
}
