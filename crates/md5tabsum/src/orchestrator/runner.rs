//! Instance runner: one connection, sequential tables.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::config::{InstanceConfig, LogLevel, MissingTablePolicy};
use crate::core::schema::{RunOutcome, RunStatus, TableChecksum};
use crate::core::traits::CatalogSession;
use crate::credentials::{CredentialProvider, Secret};
use crate::dialect::classify;
use crate::error::{Result, TabsumError};

/// Opens catalog sessions. The seam between the orchestrator and real drivers.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        instance: &InstanceConfig,
        secret: &Secret,
    ) -> Result<Box<dyn CatalogSession>>;
}

/// Connector backed by the database drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverConnector;

#[async_trait]
impl Connector for DriverConnector {
    async fn open(
        &self,
        instance: &InstanceConfig,
        secret: &Secret,
    ) -> Result<Box<dyn CatalogSession>> {
        crate::drivers::connect(instance, secret).await
    }
}

/// Lifecycle of one instance run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Pending,
    Connecting,
    Discovering,
    Hashing,
    Done,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::Pending => "PENDING",
            RunnerState::Connecting => "CONNECTING",
            RunnerState::Discovering => "DISCOVERING",
            RunnerState::Hashing => "HASHING",
            RunnerState::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Drives discovery and checksum queries for one instance.
pub struct InstanceRunner {
    instance: InstanceConfig,
    policy: MissingTablePolicy,
    state: RunnerState,
    tables_done: usize,
}

impl InstanceRunner {
    pub fn new(instance: InstanceConfig, policy: MissingTablePolicy) -> Self {
        Self {
            instance,
            policy,
            state: RunnerState::Pending,
            tables_done: 0,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    fn id(&self) -> &str {
        &self.instance.instance_id
    }

    fn transition(&mut self, next: RunnerState) {
        debug!(instance = %self.instance.instance_id, "{} -> {}", self.state, next);
        self.state = next;
    }

    /// Run to completion and return the terminal outcome.
    ///
    /// Every table result, including a failed one, is sent on `emit` as soon as it
    /// is known. The session is closed whatever the outcome.
    pub async fn run(
        mut self,
        credentials: &dyn CredentialProvider,
        connector: &dyn Connector,
        emit: &mpsc::Sender<TableChecksum>,
    ) -> RunOutcome {
        self.transition(RunnerState::Connecting);

        let secret = match credentials.get(self.id()) {
            Ok(secret) => secret,
            Err(e) => return self.finish(Err(e)),
        };

        let mut session = match connector.open(&self.instance, &secret).await {
            Ok(session) => session,
            Err(e) => return self.finish(Err(e)),
        };
        drop(secret);
        info!(
            instance = %self.instance.instance_id,
            "Connected to {}:{} ({})",
            self.instance.host,
            self.instance.port,
            self.instance.dialect
        );

        let result = self.drive(session.as_mut(), emit).await;

        if let Err(e) = session.close().await {
            warn!(instance = %self.instance.instance_id, "Error closing session: {}", e);
        }

        self.finish(result)
    }

    async fn drive(
        &mut self,
        session: &mut dyn CatalogSession,
        emit: &mpsc::Sender<TableChecksum>,
    ) -> Result<()> {
        self.transition(RunnerState::Discovering);
        let tables = self.discover_tables(session).await?;
        if tables.is_empty() {
            warn!(
                instance = %self.instance.instance_id,
                "No tables matched in schema {}", self.instance.schema
            );
        }

        self.transition(RunnerState::Hashing);
        for table in &tables {
            match self.checksum_table(session, table).await {
                Ok(checksum) => {
                    info!(
                        instance = %self.instance.instance_id,
                        "{} ({} rows)",
                        checksum.output_line(),
                        checksum.row_count
                    );
                    self.tables_done += 1;
                    send(emit, checksum).await;
                }
                Err(e) => {
                    send(emit, TableChecksum::failed(self.id(), table, e.to_string())).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Resolve every table pattern, keeping discovery order and dropping repeats.
    async fn discover_tables(&self, session: &mut dyn CatalogSession) -> Result<Vec<String>> {
        let schema = &self.instance.schema;
        let mut seen = HashSet::new();
        let mut tables = Vec::new();

        for pattern in &self.instance.table_patterns {
            let found = session.discover_tables(schema, pattern).await?;
            debug!(
                instance = %self.instance.instance_id,
                "Pattern '{}' matched {} tables", pattern, found.len()
            );

            if found.is_empty() {
                let message = format!(
                    "table pattern '{}' matched no table in schema {}",
                    pattern, schema
                );
                match self.policy {
                    MissingTablePolicy::Warn => {
                        warn!(instance = %self.instance.instance_id, "{}", message)
                    }
                    MissingTablePolicy::Fail => {
                        return Err(TabsumError::discovery(self.id(), message))
                    }
                }
            }

            for table in found {
                if seen.insert(table.clone()) {
                    tables.push(table);
                }
            }
        }

        Ok(tables)
    }

    async fn checksum_table(
        &self,
        session: &mut dyn CatalogSession,
        table: &str,
    ) -> Result<TableChecksum> {
        let schema = &self.instance.schema;
        let columns = session.discover_columns(schema, table).await?;

        if self.instance.log_level >= LogLevel::Full {
            for column in &columns {
                trace!(
                    instance = %self.instance.instance_id,
                    "{}.{} #{}: {} -> {:?}",
                    table,
                    column.name,
                    column.ordinal_position,
                    column.reported_type,
                    classify(&column.reported_type)
                );
            }
        }

        let sql = {
            let dialect = session.dialect();
            let exprs: Vec<String> = columns
                .iter()
                .map(|column| dialect.render_column_expression(column))
                .collect();
            let row_hashes = dialect.render_row_hash_query(schema, table, &exprs);
            dialect.render_aggregation_query(&row_hashes)
        };

        if self.instance.log_level >= LogLevel::Medium {
            debug!(instance = %self.instance.instance_id, "Checksum SQL for {}: {}", table, sql);
        }

        let (row_count, checksum) = session.table_checksum(table, &sql).await?;
        Ok(TableChecksum::ok(self.id(), table, row_count, checksum))
    }

    fn finish(&mut self, result: Result<()>) -> RunOutcome {
        self.transition(RunnerState::Done);
        let (status, error) = match result {
            Ok(()) => {
                info!(
                    instance = %self.instance.instance_id,
                    "Finished {} tables [OK]", self.tables_done
                );
                (RunStatus::Ok, None)
            }
            Err(e) => {
                error!(instance = %self.instance.instance_id, "{}", e);
                (RunStatus::Error, Some(e.to_string()))
            }
        };
        RunOutcome {
            instance_id: self.instance.instance_id.clone(),
            status,
            tables_done: self.tables_done,
            error,
        }
    }
}

async fn send(emit: &mpsc::Sender<TableChecksum>, checksum: TableChecksum) {
    if emit.send(checksum).await.is_err() {
        warn!("Checksum receiver closed; result dropped");
    }
}
