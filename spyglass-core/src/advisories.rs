//! Advisory-alert resolution with cross-run incremental diffing.
//!
//! Cold mode probes the alert endpoint for every public repository. Warm
//! mode loads the last published run as a baseline and only re-probes new
//! repositories and those whose advisories were not previously confirmed
//! enabled; a confirmed-enabled flag is carried forward without a network
//! call. The enabled flag is treated as monotonic in practice, so the
//! amortized probe cost shrinks to new or previously non-compliant
//! repositories.

use std::time::Duration;

use crate::domain::{AlertStatus, RepositoryDataset, RepositoryIndex, RepositoryRecord};
use crate::error::Result;
use crate::paths;
use crate::store::{DocumentStore, save_required};

/// Abstraction over the per-repository advisory-alert endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait AlertEndpoint {
    /// Whether vulnerability alerts are enabled for `owner/name`.
    fn alerts_enabled(&self, owner: &str, name: &str) -> Result<bool>;
}

/// Classify a repository's advisory status. An open vulnerability takes
/// precedence over the alert-enabled state.
pub fn classify_alert_status(vulnerable: bool, alerts_enabled: bool) -> AlertStatus {
    if vulnerable {
        AlertStatus::Vulnerable
    } else if alerts_enabled {
        AlertStatus::Clean
    } else {
        AlertStatus::Disabled
    }
}

/// Resolve advisory status for every public repository by probing the
/// alert endpoint directly. Writes the annotated dataset back and the
/// per-status index.
pub fn resolve_cold(
    store: &DocumentStore,
    endpoint: &dyn AlertEndpoint,
    date: &str,
    throttle: Duration,
) -> Result<()> {
    let mut dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());
    if dataset.is_empty() {
        log::warn!("no repository dataset for {date}; nothing to resolve");
        return Ok(());
    }

    let mut index = RepositoryIndex::new();
    for repo in dataset.public.iter_mut() {
        probe_and_classify(endpoint, repo, &mut index)?;
        std::thread::sleep(throttle);
    }

    save_required(store, &paths::repositories(date), &dataset)?;
    save_required(store, &paths::alert_status(date), &index)?;
    Ok(())
}

/// Resolve advisory status against the last published run. Only new
/// repositories and those without a confirmed-enabled baseline flag are
/// re-probed; the rest carry the baseline flag forward.
pub fn resolve_warm(
    store: &DocumentStore,
    endpoint: &dyn AlertEndpoint,
    date: &str,
    baseline_date: &str,
    throttle: Duration,
) -> Result<()> {
    let mut dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());
    if dataset.is_empty() {
        log::warn!("no repository dataset for {date}; nothing to resolve");
        return Ok(());
    }
    let baseline: RepositoryDataset = store.read(
        &paths::repositories(baseline_date),
        RepositoryDataset::default(),
    );

    let mut index = RepositoryIndex::new();
    for repo in dataset.public.iter_mut() {
        let known = baseline
            .public
            .iter()
            .find(|candidate| candidate.name == repo.name);
        match known {
            Some(previous) if previous.security_advisories_enabled_status == Some(true) => {
                repo.security_advisories_enabled_status = Some(true);
            }
            _ => {
                probe_and_classify(endpoint, repo, &mut index)?;
                std::thread::sleep(throttle);
            }
        }
    }

    save_required(store, &paths::repositories(date), &dataset)?;
    save_required(store, &paths::alert_status(date), &index)?;
    Ok(())
}

fn probe_and_classify(
    endpoint: &dyn AlertEndpoint,
    repo: &mut RepositoryRecord,
    index: &mut RepositoryIndex,
) -> Result<()> {
    let enabled = endpoint.alerts_enabled(&repo.owner.login, &repo.name)?;
    let vulnerable = !repo.vulnerability_alerts.is_empty();
    let status = classify_alert_status(vulnerable, enabled);
    repo.security_advisories_enabled_status = Some(enabled);
    index
        .entry(status.as_str().to_string())
        .or_default()
        .push(repo.clone());
    Ok(())
}
