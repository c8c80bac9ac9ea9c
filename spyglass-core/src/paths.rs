//! Logical document paths for the store layout.
//!
//! All documents are namespaced by run date except the history ledger,
//! which lives under `all/`.

/// Path of the history ledger document.
pub const HISTORY: &str = "all/data/history.json";

/// Path of the run's repository dataset.
pub fn repositories(date: &str) -> String {
    format!("{date}/data/repositories.json")
}

/// Path of the run's raw branch/commit activity document.
pub fn activity_refs(date: &str) -> String {
    format!("{date}/data/activity_refs.json")
}

/// Path of the run's raw pull request activity document.
pub fn activity_prs(date: &str) -> String {
    format!("{date}/data/activity_prs.json")
}

/// Path of the run's alert-status index.
pub fn alert_status(date: &str) -> String {
    format!("{date}/data/alert_status.json")
}

/// Path of the run's dependency-bot status document.
pub fn dependabot_status(date: &str) -> String {
    format!("{date}/data/dependabot_status.json")
}

/// Path of the run's repository → topics index.
pub fn owners(date: &str) -> String {
    format!("{date}/data/owners.json")
}

/// Path of the run's topic → repositories index.
pub fn topics(date: &str) -> String {
    format!("{date}/data/topics.json")
}

/// Path of the run's severity → repositories index.
pub fn vulnerable_by_severity(date: &str) -> String {
    format!("{date}/data/vulnerable_by_severity.json")
}

/// Path of a run-scoped route document consumed by the rendering layer.
pub fn route(date: &str, name: &str) -> String {
    format!("{date}/routes/{name}.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_paths_are_date_scoped() {
        assert_eq!(
            repositories("2024-06-01"),
            "2024-06-01/data/repositories.json"
        );
        assert_eq!(
            vulnerable_by_severity("2024-06-01"),
            "2024-06-01/data/vulnerable_by_severity.json"
        );
        assert_eq!(
            route("2024-06-01", "count_alert_status"),
            "2024-06-01/routes/count_alert_status.json"
        );
    }

    #[test]
    fn history_lives_outside_run_namespaces() {
        assert_eq!(HISTORY, "all/data/history.json");
    }
}
