//! Team membership derived from repository topics.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::RepositoryDataset;
use crate::error::{AuditError, Result};
use crate::paths;
use crate::store::{DocumentStore, save_required};

/// Team name used when no team's topics match a repository.
pub const UNKNOWN_TEAM: &str = "unknown";

/// A team and the topic labels that mark its repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDefinition {
    /// Team name.
    pub name: String,
    /// Topic labels owned by the team.
    pub topics: Vec<String>,
}

/// Load team definitions from a local JSON file. Team definitions live
/// outside the document store; they are an external input, not audit output.
pub fn load_team_definitions(path: &Path) -> Result<Vec<TeamDefinition>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| {
        AuditError::Other(format!(
            "failed to parse team definitions at {}: {err}",
            path.display()
        ))
    })
}

/// Assign each repository to the last team whose topic list intersects the
/// repository's topics.
///
/// Last match wins: when several teams claim a topic of the same
/// repository, the team latest in definition order takes it. Repositories
/// matching no team get [`UNKNOWN_TEAM`].
pub fn assign_teams(dataset: &mut RepositoryDataset, teams: &[TeamDefinition]) {
    for repo in dataset.iter_mut() {
        let mut assigned = UNKNOWN_TEAM.to_string();
        for team in teams {
            if team.topics.iter().any(|topic| repo.topics.contains(topic)) {
                assigned = team.name.clone();
            }
        }
        repo.team = Some(assigned);
    }
}

/// Annotate the run's dataset with team membership and write it back.
pub fn analyse_team_membership(
    store: &DocumentStore,
    date: &str,
    teams_file: &Path,
) -> Result<()> {
    let teams = load_team_definitions(teams_file)?;
    let mut dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());
    if dataset.is_empty() {
        log::warn!("no repository dataset for {date}; nothing to assign");
        return Ok(());
    }

    assign_teams(&mut dataset, &teams);
    save_required(store, &paths::repositories(date), &dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepositoryRecord;

    fn repo(name: &str, topics: &[&str]) -> RepositoryRecord {
        RepositoryRecord {
            name: name.to_string(),
            topics: topics.iter().map(|topic| topic.to_string()).collect(),
            ..RepositoryRecord::default()
        }
    }

    fn team(name: &str, topics: &[&str]) -> TeamDefinition {
        TeamDefinition {
            name: name.to_string(),
            topics: topics.iter().map(|topic| topic.to_string()).collect(),
        }
    }

    #[test]
    fn last_matching_team_wins() {
        let mut dataset = RepositoryDataset {
            public: vec![repo("shared", &["payments", "platform"])],
            private: Vec::new(),
        };
        let teams = vec![
            team("payments-team", &["payments"]),
            team("platform-team", &["platform"]),
        ];

        assign_teams(&mut dataset, &teams);
        assert_eq!(dataset.public[0].team.as_deref(), Some("platform-team"));
    }

    #[test]
    fn unmatched_repositories_default_to_unknown() {
        let mut dataset = RepositoryDataset {
            public: vec![repo("stray", &["docs"])],
            private: vec![repo("hidden", &[])],
        };
        assign_teams(&mut dataset, &[team("payments-team", &["payments"])]);
        assert_eq!(dataset.public[0].team.as_deref(), Some(UNKNOWN_TEAM));
        assert_eq!(dataset.private[0].team.as_deref(), Some(UNKNOWN_TEAM));
    }

    #[test]
    fn private_repositories_are_assigned_too() {
        let mut dataset = RepositoryDataset {
            public: Vec::new(),
            private: vec![repo("internal", &["platform"])],
        };
        assign_teams(&mut dataset, &[team("platform-team", &["platform"])]);
        assert_eq!(dataset.private[0].team.as_deref(), Some("platform-team"));
    }

    #[test]
    fn definitions_load_from_json_file() {
        let path = std::env::temp_dir().join(format!(
            "spyglass_teams_test_{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system time")
                .as_nanos()
        ));
        std::fs::write(
            &path,
            r#"[{"name": "payments-team", "topics": ["payments"]}]"#,
        )
        .expect("write teams file");

        let teams = load_team_definitions(&path).expect("load");
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].name, "payments-team");

        std::fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn missing_definitions_file_is_an_error() {
        let result = load_team_definitions(Path::new("/nonexistent/teams.json"));
        assert!(result.is_err());
    }
}
