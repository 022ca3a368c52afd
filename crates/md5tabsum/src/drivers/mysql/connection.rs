//! MySQL/MariaDB connection over SQLx.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection as SqlxMySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::{Connection as _, Executor, Row};
use tracing::debug;

use crate::config::InstanceConfig;
use crate::core::traits::{Connection, TextRow};
use crate::credentials::Secret;
use crate::error::{Result, TabsumError};

/// A single SQLx MySQL connection.
pub struct MysqlConnection {
    conn: SqlxMySqlConnection,
}

impl MysqlConnection {
    fn build_options(instance: &InstanceConfig, secret: &Secret) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&instance.host)
            .port(instance.port)
            .username(&instance.user)
            .password(secret.expose())
            .database(instance.database_or_schema())
            .ssl_mode(MySqlSslMode::Preferred)
    }

    /// Open a connection for `instance`.
    pub async fn connect(instance: &InstanceConfig, secret: &Secret) -> Result<Self> {
        let options = Self::build_options(instance, secret);
        let conn = SqlxMySqlConnection::connect_with(&options).await?;
        debug!(
            "Connected to MySQL {}:{}/{}",
            instance.host,
            instance.port,
            instance.database_or_schema()
        );
        Ok(Self { conn })
    }
}

/// Read cell `idx` as text, trying the representations MySQL result columns decode to.
fn cell_to_text(row: &MySqlRow, idx: usize) -> Result<Option<String>> {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return Ok(v);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return Ok(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return Ok(v.map(|n| n.to_string()));
    }
    match row.try_get::<Option<Vec<u8>>, _>(idx) {
        Ok(v) => Ok(v.map(|b| String::from_utf8_lossy(&b).into_owned())),
        Err(e) => Err(TabsumError::Config(format!(
            "unsupported MySQL result type in column {}: {}",
            idx, e
        ))),
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        Executor::execute(&mut self.conn, sql).await?;
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<TextRow>> {
        let rows: Vec<MySqlRow> = Executor::fetch_all(&mut self.conn, sql).await?;
        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|idx| cell_to_text(row, idx))
                    .collect::<Result<TextRow>>()
            })
            .collect()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}
