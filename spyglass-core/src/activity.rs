//! Pull-request recency and commit-activity classification.

use chrono::{DateTime, Duration, Months, Utc};

use crate::domain::{
    ActivityPrsDocument, ActivityRefsDocument, CurrencyBand, PullRequestSummary,
    RepositoryActivity, RepositoryDataset,
};
use crate::error::Result;
use crate::paths;
use crate::store::{DocumentStore, save_required};

/// Status string for a repository with no pull requests at all.
pub const NO_PULL_REQUESTS: &str = "No pull requests in this repository";

/// Derived commit statistics for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitStats {
    /// Whole days since the most recent commit.
    pub recent_days_ago: i64,
    /// Average whole days between commits over the repository lifetime.
    pub average_frequency: i64,
}

/// Human-readable recency of the most recent pull request.
///
/// The first entry is treated as the most recent pull request; this is an
/// upstream edge-ordering contract. Lifecycle state picks the terminal
/// timestamp: merge date for merged, close date for closed, creation date
/// for still-open pull requests.
pub fn pull_request_status(pull_requests: &[PullRequestSummary], now: DateTime<Utc>) -> String {
    let Some(latest) = pull_requests.first() else {
        return NO_PULL_REQUESTS.to_string();
    };

    let (state, reference) = if latest.merged {
        ("merged", latest.merged_at.unwrap_or(latest.created_at))
    } else if latest.closed {
        ("closed", latest.closed_at.unwrap_or(latest.created_at))
    } else {
        ("open", latest.created_at)
    };

    let year_ago = now.checked_sub_months(Months::new(12)).unwrap_or(now);
    let month_ago = now.checked_sub_months(Months::new(1)).unwrap_or(now);
    let week_ago = now - Duration::weeks(1);

    if reference < year_ago {
        format!("Last pull request more than a year ago ({state})")
    } else if reference < month_ago {
        format!("Last pull request more than a month ago ({state})")
    } else if reference < week_ago {
        format!("Last pull request more than a week ago ({state})")
    } else {
        format!("Last pull request this week ({state})")
    }
}

/// Flatten a repository's commits across all branches into one time series
/// and derive recency/frequency statistics. Returns `None` for zero commits.
pub fn commit_stats(activity: &RepositoryActivity, now: DateTime<Utc>) -> Option<CommitStats> {
    let mut dates: Vec<DateTime<Utc>> = activity
        .branches
        .iter()
        .flat_map(|branch| branch.commit_dates.iter().copied())
        .collect();
    if dates.is_empty() {
        return None;
    }
    dates.sort();

    let first = dates[0];
    let last = dates[dates.len() - 1];
    let span = last - first;
    let average = Duration::seconds(span.num_seconds() / dates.len() as i64);

    Some(CommitStats {
        recent_days_ago: (now - last).num_days(),
        average_frequency: average.num_days(),
    })
}

/// Annotate every repository with its pull-request recency status and
/// write the dataset back.
pub fn analyse_pull_requests(store: &DocumentStore, date: &str, now: DateTime<Utc>) -> Result<()> {
    let mut dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());
    if dataset.is_empty() {
        log::warn!("no repository dataset for {date}; nothing to analyse");
        return Ok(());
    }
    let pull_requests: ActivityPrsDocument =
        store.read(&paths::activity_prs(date), ActivityPrsDocument::new());

    for repo in dataset.public.iter_mut() {
        let repo_prs = pull_requests
            .get(&repo.name)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        repo.recent_pull_request_status = Some(pull_request_status(repo_prs, now));
    }

    save_required(store, &paths::repositories(date), &dataset)
}

/// Annotate repositories with commit recency/frequency statistics, the
/// active flag, and the currency band, then write the dataset back.
/// Repositories with zero commits are left unannotated.
pub fn analyse_commit_activity(store: &DocumentStore, date: &str, now: DateTime<Utc>) -> Result<()> {
    let mut dataset: RepositoryDataset =
        store.read(&paths::repositories(date), RepositoryDataset::default());
    if dataset.is_empty() {
        log::warn!("no repository dataset for {date}; nothing to analyse");
        return Ok(());
    }
    let refs: ActivityRefsDocument =
        store.read(&paths::activity_refs(date), ActivityRefsDocument::new());

    for (name, activity) in &refs {
        let Some(stats) = commit_stats(activity, now) else {
            continue;
        };
        for repo in dataset.iter_mut().filter(|repo| &repo.name == name) {
            repo.recent_commit_days_ago = Some(stats.recent_days_ago);
            repo.average_commit_frequency = Some(stats.average_frequency);
            repo.is_active = Some(stats.recent_days_ago < 365 && stats.average_frequency < 180);
            repo.currency_band = Some(CurrencyBand::from_days(stats.recent_days_ago));
        }
    }

    save_required(store, &paths::repositories(date), &dataset)
}
