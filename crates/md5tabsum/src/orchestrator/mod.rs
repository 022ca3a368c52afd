//! Checksum orchestrator - runs every active instance concurrently.
//!
//! One tokio task per instance. Each task owns one session for its whole life,
//! streams `TableChecksum` records to the caller as they complete and sends a
//! single `RunOutcome` into a bounded channel. The orchestrator joins every task
//! before OR-reducing the outcomes, so a failing instance never cancels a sibling.

mod runner;

pub use runner::{Connector, DriverConnector, InstanceRunner, RunnerState};

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::{Config, InstanceConfig, MissingTablePolicy};
use crate::core::schema::{RunOutcome, RunStatus, TableChecksum};
use crate::credentials::CredentialProvider;

/// Checksum orchestrator.
pub struct Orchestrator {
    instances: Vec<InstanceConfig>,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn Connector>,
    policy: MissingTablePolicy,
}

/// Result of a checksum run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// One outcome per active instance, ordered by instance id.
    pub outcomes: Vec<RunOutcome>,

    /// OR of every outcome status.
    pub status: RunStatus,
}

impl RunSummary {
    /// Process exit code.
    pub fn exit_code(&self) -> u8 {
        self.status.code()
    }

    /// Outcomes that ended in ERROR.
    pub fn failed(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == RunStatus::Error)
    }
}

impl Orchestrator {
    /// Create an orchestrator over explicit instances and collaborators.
    pub fn new(
        instances: Vec<InstanceConfig>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        policy: MissingTablePolicy,
    ) -> Self {
        Self {
            instances,
            credentials,
            connector,
            policy,
        }
    }

    /// Create an orchestrator for the active instances of `config`.
    pub fn from_config(
        config: &Config,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self::new(
            config.active_instances(),
            credentials,
            connector,
            config.on_missing_table,
        )
    }

    /// Run every active instance and wait for all of them.
    ///
    /// Table results are sent on `emit` while the run is in progress, so the caller
    /// must drain the receiver concurrently.
    pub async fn run(self, emit: mpsc::Sender<TableChecksum>) -> RunSummary {
        let (active, skipped): (Vec<_>, Vec<_>) =
            self.instances.into_iter().partition(|i| i.active);
        for instance in &skipped {
            debug!(instance = %instance.instance_id, "Inactive, skipped");
        }
        info!("Starting checksum run for {} instances", active.len());

        let (tx, mut rx) = mpsc::channel::<RunOutcome>(active.len().max(1));
        let mut handles = Vec::with_capacity(active.len());

        for instance in active {
            let instance_id = instance.instance_id.clone();
            let credentials = self.credentials.clone();
            let connector = self.connector.clone();
            let emit = emit.clone();
            let tx = tx.clone();
            let policy = self.policy;

            let handle = tokio::spawn(async move {
                let outcome = InstanceRunner::new(instance, policy)
                    .run(credentials.as_ref(), connector.as_ref(), &emit)
                    .await;
                // Capacity equals the task count, so this never waits.
                let _ = tx.send(outcome).await;
            });
            handles.push((instance_id, handle));
        }
        drop(tx);
        drop(emit);

        let (instance_ids, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        let mut outcomes = Vec::with_capacity(handles.len());
        for (instance_id, joined) in instance_ids.into_iter().zip(join_all(handles).await) {
            if let Err(e) = joined {
                error!(instance = %instance_id, "Instance task panicked: {}", e);
                outcomes.push(RunOutcome {
                    instance_id,
                    status: RunStatus::Error,
                    tables_done: 0,
                    error: Some(format!("task panicked: {}", e)),
                });
            }
        }
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));

        let status = outcomes
            .iter()
            .fold(RunStatus::Ok, |acc, outcome| acc | outcome.status);
        info!(
            "Checksum run finished: {} instances, {} failed [{}]",
            outcomes.len(),
            outcomes.iter().filter(|o| o.status == RunStatus::Error).count(),
            status
        );

        RunSummary { outcomes, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{canonical_decimal, TableDigest, EMPTY_TABLE_CHECKSUM, NULL_SENTINEL};
    use crate::core::schema::ColumnDescriptor;
    use crate::core::traits::{CatalogSession, Dialect};
    use crate::credentials::{Secret, StaticCredentials};
    use crate::dialect::DialectKind;
    use crate::drivers::DialectImpl;
    use crate::error::{Result, TabsumError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Rows = Vec<Vec<Option<&'static str>>>;

    #[derive(Clone)]
    struct FakeTable {
        columns: Vec<ColumnDescriptor>,
        rows: Rows,
    }

    /// In-memory session computing checksums with the reference aggregator.
    struct FakeSession {
        dialect: DialectImpl,
        tables: Vec<(String, FakeTable)>,
        fail_query_on: Option<String>,
        closed: Arc<Mutex<Vec<String>>>,
        instance_id: String,
    }

    fn canonical(value: Option<&str>) -> String {
        value.map(canonical_decimal).unwrap_or_else(|| NULL_SENTINEL.to_string())
    }

    #[async_trait]
    impl CatalogSession for FakeSession {
        fn dialect(&self) -> &dyn Dialect {
            &self.dialect
        }

        async fn discover_tables(&mut self, _schema: &str, pattern: &str) -> Result<Vec<String>> {
            let prefix = pattern.trim_end_matches('%').to_lowercase();
            let wildcard = pattern.ends_with('%');
            Ok(self
                .tables
                .iter()
                .map(|(name, _)| name.clone())
                .filter(|name| {
                    let name = name.to_lowercase();
                    if wildcard {
                        name.starts_with(&prefix)
                    } else {
                        name == prefix
                    }
                })
                .collect())
        }

        async fn discover_columns(
            &mut self,
            _schema: &str,
            table: &str,
        ) -> Result<Vec<ColumnDescriptor>> {
            self.tables
                .iter()
                .find(|(name, _)| name == table)
                .map(|(_, t)| t.columns.clone())
                .ok_or_else(|| TabsumError::discovery(&self.instance_id, "no such table"))
        }

        async fn table_checksum(&mut self, table: &str, sql: &str) -> Result<(u64, String)> {
            assert!(sql.contains("CHECKSUM"));
            if self.fail_query_on.as_deref() == Some(table) {
                return Err(TabsumError::query(&self.instance_id, table, "division by zero"));
            }
            let (_, t) = self
                .tables
                .iter()
                .find(|(name, _)| name == table)
                .ok_or_else(|| TabsumError::query(&self.instance_id, table, "missing"))?;
            let mut digest = TableDigest::new();
            for row in &t.rows {
                let fields: Vec<String> = row.iter().map(|v| canonical(*v)).collect();
                digest.add_row(&fields);
            }
            Ok((digest.row_count(), digest.finish()))
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.lock().unwrap().push(self.instance_id.clone());
            Ok(())
        }
    }

    /// Connector handing out fake sessions; instances listed in `unreachable` fail to connect.
    struct FakeConnector {
        tables: HashMap<String, Vec<(String, FakeTable)>>,
        unreachable: Vec<String>,
        fail_query: HashMap<String, String>,
        closed: Arc<Mutex<Vec<String>>>,
    }

    impl FakeConnector {
        fn new() -> Self {
            Self {
                tables: HashMap::new(),
                unreachable: Vec::new(),
                fail_query: HashMap::new(),
                closed: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn with_table(mut self, instance_id: &str, name: &str, table: FakeTable) -> Self {
            self.tables
                .entry(instance_id.to_string())
                .or_default()
                .push((name.to_string(), table));
            self
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn open(
            &self,
            instance: &InstanceConfig,
            secret: &Secret,
        ) -> Result<Box<dyn CatalogSession>> {
            assert_eq!(secret.expose(), "pw");
            if self.unreachable.contains(&instance.instance_id) {
                return Err(TabsumError::connection(
                    &instance.instance_id,
                    "connection refused",
                ));
            }
            Ok(Box::new(FakeSession {
                dialect: DialectImpl::from_kind(instance.dialect),
                tables: self
                    .tables
                    .get(&instance.instance_id)
                    .cloned()
                    .unwrap_or_default(),
                fail_query_on: self.fail_query.get(&instance.instance_id).cloned(),
                closed: self.closed.clone(),
                instance_id: instance.instance_id.clone(),
            }))
        }
    }

    fn people(rows: Rows) -> FakeTable {
        FakeTable {
            columns: vec![
                ColumnDescriptor::new("id", "INT", 1),
                ColumnDescriptor::new("name", "VARCHAR(10)", 2),
            ],
            rows,
        }
    }

    fn instance(kind: DialectKind, name: &str, patterns: &[&str]) -> InstanceConfig {
        let mut instance = InstanceConfig::sample(kind, name);
        instance.table_patterns = patterns.iter().map(|p| p.to_string()).collect();
        instance
    }

    fn credentials(ids: &[&str]) -> Arc<dyn CredentialProvider> {
        let creds = ids
            .iter()
            .fold(StaticCredentials::new(), |c, id| c.with(*id, "pw"));
        Arc::new(creds)
    }

    async fn run(
        instances: Vec<InstanceConfig>,
        creds: Arc<dyn CredentialProvider>,
        connector: Arc<FakeConnector>,
        policy: MissingTablePolicy,
    ) -> (RunSummary, Vec<TableChecksum>) {
        let (tx, mut rx) = mpsc::channel(16);
        let orchestrator = Orchestrator::new(instances, creds, connector, policy);
        let handle = tokio::spawn(orchestrator.run(tx));
        let mut emitted = Vec::new();
        while let Some(checksum) = rx.recv().await {
            emitted.push(checksum);
        }
        (handle.await.unwrap(), emitted)
    }

    #[tokio::test]
    async fn test_success_and_connection_failure() {
        let a = instance(DialectKind::Postgresql, "a", &["people"]);
        let b = instance(DialectKind::Mssql, "b", &["people"]);
        let mut connector = FakeConnector::new().with_table(
            "postgresql.a",
            "people",
            people(vec![vec![Some("1"), Some("a")], vec![Some("2"), Some("b")]]),
        );
        connector.unreachable.push("mssql.b".to_string());
        let connector = Arc::new(connector);

        let (summary, emitted) = run(
            vec![a, b],
            credentials(&["postgresql.a", "mssql.b"]),
            connector.clone(),
            MissingTablePolicy::Warn,
        )
        .await;

        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(summary.exit_code(), 2);
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_ok());
        assert_eq!(emitted[0].row_count, 2);
        assert!(emitted[0].output_line().starts_with("postgresql.a.people:"));

        let failed: Vec<&str> = summary.failed().map(|o| o.instance_id.as_str()).collect();
        assert_eq!(failed, vec!["mssql.b"]);
        assert!(summary.outcomes[0].error.as_deref().unwrap().contains("connection refused"));

        // Only the instance that connected had a session to close.
        assert_eq!(*connector.closed.lock().unwrap(), vec!["postgresql.a"]);
    }

    #[tokio::test]
    async fn test_row_order_does_not_change_checksum() {
        let forward = people(vec![vec![Some("1"), Some("a")], vec![Some("2"), Some("b")]]);
        let backward = people(vec![vec![Some("2"), Some("b")], vec![Some("1"), Some("a")]]);
        let connector = Arc::new(
            FakeConnector::new()
                .with_table("postgresql.fwd", "people", forward)
                .with_table("oracle.bwd", "people", backward),
        );

        let (summary, emitted) = run(
            vec![
                instance(DialectKind::Postgresql, "fwd", &["people"]),
                instance(DialectKind::Oracle, "bwd", &["people"]),
            ],
            credentials(&["postgresql.fwd", "oracle.bwd"]),
            connector,
            MissingTablePolicy::Warn,
        )
        .await;

        assert_eq!(summary.status, RunStatus::Ok);
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].checksum_hex, emitted[1].checksum_hex);
    }

    #[tokio::test]
    async fn test_empty_table_emits_constant() {
        let connector =
            Arc::new(FakeConnector::new().with_table("mysql.shop", "people", people(vec![])));
        let (summary, emitted) = run(
            vec![instance(DialectKind::Mysql, "shop", &["people"])],
            credentials(&["mysql.shop"]),
            connector,
            MissingTablePolicy::Warn,
        )
        .await;

        assert_eq!(summary.status, RunStatus::Ok);
        assert_eq!(emitted[0].checksum_hex, EMPTY_TABLE_CHECKSUM);
        assert_eq!(emitted[0].row_count, 0);
    }

    #[tokio::test]
    async fn test_missing_pattern_warn_continues() {
        let connector = Arc::new(FakeConnector::new().with_table(
            "postgresql.a",
            "people",
            people(vec![vec![Some("1"), None]]),
        ));
        let (summary, emitted) = run(
            vec![instance(DialectKind::Postgresql, "a", &["ghost", "people"])],
            credentials(&["postgresql.a"]),
            connector,
            MissingTablePolicy::Warn,
        )
        .await;

        assert_eq!(summary.status, RunStatus::Ok);
        assert_eq!(summary.outcomes[0].tables_done, 1);
        assert_eq!(emitted.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_pattern_fail_aborts_instance() {
        let connector = Arc::new(FakeConnector::new().with_table(
            "postgresql.a",
            "people",
            people(vec![vec![Some("1"), None]]),
        ));
        let (summary, emitted) = run(
            vec![instance(DialectKind::Postgresql, "a", &["ghost", "people"])],
            credentials(&["postgresql.a"]),
            connector,
            MissingTablePolicy::Fail,
        )
        .await;

        assert_eq!(summary.status, RunStatus::Error);
        assert!(summary.outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("'ghost' matched no table"));
        assert!(emitted.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_matches_are_checksummed_once() {
        let connector = Arc::new(
            FakeConnector::new()
                .with_table("postgresql.a", "people", people(vec![]))
                .with_table("postgresql.a", "people_old", people(vec![])),
        );
        let (_, emitted) = run(
            vec![instance(DialectKind::Postgresql, "a", &["people%", "people"])],
            credentials(&["postgresql.a"]),
            connector,
            MissingTablePolicy::Warn,
        )
        .await;

        let tables: Vec<&str> = emitted.iter().map(|c| c.table_name.as_str()).collect();
        assert_eq!(tables, vec!["people", "people_old"]);
    }

    #[tokio::test]
    async fn test_query_error_keeps_earlier_results() {
        let mut connector = FakeConnector::new()
            .with_table("postgresql.a", "t1", people(vec![vec![Some("1"), Some("x")]]))
            .with_table("postgresql.a", "t2", people(vec![]))
            .with_table("postgresql.a", "t3", people(vec![]));
        connector
            .fail_query
            .insert("postgresql.a".to_string(), "t2".to_string());
        let connector = Arc::new(connector);

        let (summary, emitted) = run(
            vec![instance(DialectKind::Postgresql, "a", &["t%"])],
            credentials(&["postgresql.a"]),
            connector.clone(),
            MissingTablePolicy::Warn,
        )
        .await;

        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(summary.outcomes[0].tables_done, 1);
        assert_eq!(emitted.len(), 2);
        assert!(emitted[0].is_ok());
        assert!(!emitted[1].is_ok());
        assert_eq!(emitted[1].table_name, "t2");
        // The session is closed even though the run failed.
        assert_eq!(connector.closed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_isolated_to_instance() {
        let connector = Arc::new(
            FakeConnector::new()
                .with_table("postgresql.a", "people", people(vec![]))
                .with_table("mysql.b", "people", people(vec![])),
        );
        let (summary, emitted) = run(
            vec![
                instance(DialectKind::Postgresql, "a", &["people"]),
                instance(DialectKind::Mysql, "b", &["people"]),
            ],
            credentials(&["postgresql.a"]),
            connector,
            MissingTablePolicy::Warn,
        )
        .await;

        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].instance_id, "postgresql.a");
        let failed: Vec<&str> = summary.failed().map(|o| o.instance_id.as_str()).collect();
        assert_eq!(failed, vec!["mysql.b"]);
    }

    #[tokio::test]
    async fn test_inactive_instances_are_skipped() {
        let mut inactive = instance(DialectKind::Postgresql, "off", &["people"]);
        inactive.active = false;
        let (summary, emitted) = run(
            vec![inactive],
            credentials(&[]),
            Arc::new(FakeConnector::new()),
            MissingTablePolicy::Warn,
        )
        .await;

        assert!(summary.outcomes.is_empty());
        assert_eq!(summary.status, RunStatus::Ok);
        assert!(emitted.is_empty());
    }

    #[tokio::test]
    async fn test_changed_cell_changes_checksum() {
        let connector = Arc::new(
            FakeConnector::new()
                .with_table("postgresql.a", "people", people(vec![vec![Some("1"), Some("a")]]))
                .with_table("postgresql.b", "people", people(vec![vec![Some("1"), Some("b")]])),
        );
        let (_, emitted) = run(
            vec![
                instance(DialectKind::Postgresql, "a", &["people"]),
                instance(DialectKind::Postgresql, "b", &["people"]),
            ],
            credentials(&["postgresql.a", "postgresql.b"]),
            connector,
            MissingTablePolicy::Warn,
        )
        .await;

        assert_eq!(emitted.len(), 2);
        assert_ne!(emitted[0].checksum_hex, emitted[1].checksum_hex);
    }

    #[test]
    fn test_runner_starts_pending() {
        let runner = InstanceRunner::new(
            instance(DialectKind::Exasol, "dwh", &["t"]),
            MissingTablePolicy::Warn,
        );
        assert_eq!(runner.state(), RunnerState::Pending);
        assert_eq!(RunnerState::Hashing.to_string(), "HASHING");
    }
}
