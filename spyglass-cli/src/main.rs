#![deny(missing_docs)]
//! Spyglass command-line interface.
//!
//! Runs full organization audits and selective task re-runs against a
//! local or object-store document store.

mod dependabot_api;
mod github;
mod object_store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use spyglass_core::pipeline::{
    AuditClients, AuditConfig, AuditRunResult, AuditRunner, AuditTask, PhaseStatus,
};
use spyglass_core::store::DocumentStore;

use dependabot_api::DependabotApiClient;
use github::{GithubAlertProbe, GithubGraphqlClient};
use object_store::ObjectStoreBackend;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "spyglass", version, about = "Spyglass audit CLI")]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Settings {
    /// Organization to audit.
    #[arg(long, env = "SPYGLASS_ORG")]
    org: String,
    /// Where audit documents are stored.
    #[arg(long, value_enum, default_value_t = StorageKind::Local)]
    storage: StorageKind,
    /// Root directory (local storage) or bucket name (object storage).
    #[arg(long, default_value = "audit-data")]
    location: String,
    /// Path of the team definitions file.
    #[arg(long, default_value = "teams.json")]
    teams: PathBuf,
    /// Run date override, ISO format. Defaults to today.
    #[arg(long)]
    date: Option<String>,
    /// Delay between advisory-alert probes, in milliseconds.
    #[arg(long, default_value_t = 200)]
    throttle_ms: u64,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum StorageKind {
    Local,
    Object,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full audit: fetch, resolve advisories, classify, build routes.
    Audit,
    /// Re-run a single named task for the run date.
    RunTask {
        /// Task name, e.g. repository-status, advisories, routes.
        task: String,
    },
}

#[cfg(not(test))]
fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = build_store(&cli.settings);
    let runner = build_runner(&cli.settings);
    let date = run_date(&cli.settings);

    let result = match cli.command {
        Commands::Audit => runner.run(&store, &date),
        Commands::RunTask { task } => {
            let task = AuditTask::from_name(&task)
                .ok_or_else(|| format!("unknown task: {task}"))?;
            runner.run_task(&store, task, &date)
        }
    };

    emit_result(&result)?;
    if result.status == PhaseStatus::Failed {
        return Err(format!("audit run for {date} had failed phases").into());
    }
    Ok(())
}

#[cfg(test)]
fn main() {}

fn build_store(settings: &Settings) -> DocumentStore {
    match settings.storage {
        StorageKind::Local => DocumentStore::local(&settings.location),
        StorageKind::Object => {
            let backend = ObjectStoreBackend::from_env().with_bucket(&settings.location);
            DocumentStore::new(Box::new(backend))
        }
    }
}

fn build_runner(settings: &Settings) -> AuditRunner {
    let clients = AuditClients::new(
        Arc::new(GithubGraphqlClient::from_env()),
        Arc::new(GithubAlertProbe::from_env()),
        Arc::new(DependabotApiClient::from_env()),
    );
    let mut config = AuditConfig::new(settings.org.clone());
    config.alert_throttle = Duration::from_millis(settings.throttle_ms);
    config.teams_file = settings.teams.clone();
    AuditRunner::new(clients, config)
}

fn run_date(settings: &Settings) -> String {
    settings
        .date
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().date_naive().to_string())
}

fn emit_result(result: &AuditRunResult) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(result)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn settings(date: Option<&str>) -> Settings {
        Settings {
            org: "acme".to_string(),
            storage: StorageKind::Local,
            location: "audit-data".to_string(),
            teams: PathBuf::from("teams.json"),
            date: date.map(str::to_string),
            throttle_ms: 200,
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_date_prefers_the_override() {
        assert_eq!(run_date(&settings(Some("2024-06-01"))), "2024-06-01");
        let today = chrono::Utc::now().date_naive().to_string();
        assert_eq!(run_date(&settings(None)), today);
    }

    #[test]
    fn audit_and_run_task_parse() {
        let cli = Cli::try_parse_from(["spyglass", "--org", "acme", "audit"]).expect("audit");
        assert!(matches!(cli.command, Commands::Audit));

        let cli = Cli::try_parse_from([
            "spyglass",
            "--org",
            "acme",
            "--storage",
            "object",
            "--location",
            "bucket",
            "run-task",
            "advisories",
        ])
        .expect("run-task");
        match cli.command {
            Commands::RunTask { task } => assert_eq!(task, "advisories"),
            _ => panic!("expected run-task"),
        }
        assert_eq!(cli.settings.storage, StorageKind::Object);
    }

    #[test]
    fn unknown_task_names_are_rejected() {
        assert!(AuditTask::from_name("not-a-task").is_none());
        assert!(AuditTask::from_name("routes").is_some());
    }
}
