#![deny(missing_docs)]
//! Spyglass core library.
//!
//! This crate contains the domain types, document store, classifiers, and
//! audit orchestration that power the broader Spyglass platform.

pub mod activity;
pub mod advisories;
pub mod dependabot;
pub mod domain;
pub mod error;
pub mod history;
pub mod ownership;
pub mod paths;
pub mod pipeline;
pub mod query;
pub mod routes;
pub mod severity;
pub mod store;
pub mod teams;

pub use advisories::{AlertEndpoint, classify_alert_status};
pub use dependabot::DependabotService;
pub use domain::{
    AlertStatus, CurrencyBand, RepositoryDataset, RepositoryNode, RepositoryRecord, Severity,
    VulnerabilityAlert,
};
pub use error::{AuditError, Result};
pub use history::AuditHistory;
pub use pipeline::{
    AuditClients, AuditConfig, AuditRunResult, AuditRunner, AuditTask, PhaseStatus,
};
pub use query::{PagedQuery, PageRequest, QueryKind, QueryPage};
pub use store::{DocumentStore, StorageBackend, StoreOptions};
