//! History ledger: which run is published, and every run ever started.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::paths;
use crate::store::DocumentStore;

/// Lifecycle state of an audit run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// The run has started but not completed every phase.
    #[serde(rename = "in progress")]
    InProgress,
    /// Every phase finished and the run was published.
    #[serde(rename = "complete")]
    Complete,
}

/// The history ledger document at `all/data/history.json`.
///
/// `alltime` is append-only: runs are added and advanced to complete,
/// never removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditHistory {
    /// Date of the last published run, used as the diffing baseline.
    pub current: Option<String>,
    /// Every run ever started, keyed by run date.
    pub alltime: BTreeMap<String, RunState>,
}

impl AuditHistory {
    /// Record that a run has started.
    pub fn mark_in_progress(&mut self, date: &str) {
        self.alltime.insert(date.to_string(), RunState::InProgress);
    }

    /// Record that a run completed and publish it as current.
    pub fn mark_complete(&mut self, date: &str) {
        self.alltime.insert(date.to_string(), RunState::Complete);
        self.current = Some(date.to_string());
    }
}

/// Load the ledger, defaulting to an empty history when absent.
pub fn load(store: &DocumentStore) -> AuditHistory {
    store.read(paths::HISTORY, AuditHistory::default())
}

/// Persist the ledger. Returns whether the write succeeded.
pub fn save(store: &DocumentStore, history: &AuditHistory) -> bool {
    store.save(paths::HISTORY, history)
}
