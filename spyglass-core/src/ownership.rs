//! Ownership/topic indices derived from repository topic labels.

use std::collections::BTreeMap;

use crate::domain::RepositoryDataset;
use crate::error::Result;
use crate::paths;
use crate::store::{DocumentStore, save_required};

/// Fan public repositories' topics out into a repository → topics index
/// (`owners.json`) and a topic → repositories index (`topics.json`).
pub fn analyse_repo_ownership(store: &DocumentStore, date: &str) -> Result<()> {
    let dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());

    let mut owners: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut topics: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for repo in &dataset.public {
        for topic in &repo.topics {
            owners
                .entry(repo.name.clone())
                .or_default()
                .push(topic.clone());
            topics
                .entry(topic.clone())
                .or_default()
                .push(repo.name.clone());
        }
    }

    save_required(store, &paths::owners(date), &owners)?;
    save_required(store, &paths::topics(date), &topics)?;
    Ok(())
}
