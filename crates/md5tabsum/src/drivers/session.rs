//! Live catalog sessions: a dialect bound to one connection.

use async_trait::async_trait;
use tracing::debug;

use super::DialectImpl;
use crate::checksum::normalize_checksum;
use crate::config::InstanceConfig;
use crate::core::identifier::validate_identifier;
use crate::core::schema::ColumnDescriptor;
use crate::core::traits::{CatalogSession, Connection, Dialect};
use crate::credentials::Secret;
use crate::dialect::DialectKind;
use crate::error::{Result, TabsumError};

/// A [`CatalogSession`] that renders SQL with a [`DialectImpl`] and runs it on a
/// [`Connection`].
pub struct SqlSession {
    instance_id: String,
    dialect: DialectImpl,
    conn: Box<dyn Connection>,
}

impl SqlSession {
    pub fn new(instance_id: impl Into<String>, dialect: DialectImpl, conn: Box<dyn Connection>) -> Self {
        Self {
            instance_id: instance_id.into(),
            dialect,
            conn,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Run the dialect's session setup statements.
    pub async fn setup(&mut self) -> Result<()> {
        for sql in self.dialect.session_setup() {
            debug!(instance = %self.instance_id, "Session setup: {}", sql);
            self.conn
                .execute(sql)
                .await
                .map_err(|e| TabsumError::connection(&self.instance_id, e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSession for SqlSession {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn discover_tables(&mut self, schema: &str, pattern: &str) -> Result<Vec<String>> {
        validate_identifier(schema)?;
        let sql = self.dialect.tables_query(schema, pattern);
        let rows = self
            .conn
            .query(&sql)
            .await
            .map_err(|e| TabsumError::discovery(&self.instance_id, e.to_string()))?;

        rows.into_iter()
            .map(|row| match row.into_iter().next().flatten() {
                Some(name) => Ok(name),
                None => Err(TabsumError::discovery(
                    &self.instance_id,
                    format!("table query for pattern '{}' returned a NULL name", pattern),
                )),
            })
            .collect()
    }

    async fn discover_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>> {
        validate_identifier(schema)?;
        validate_identifier(table)?;
        let sql = self.dialect.columns_query(schema, table);
        let rows = self
            .conn
            .query(&sql)
            .await
            .map_err(|e| TabsumError::discovery(&self.instance_id, e.to_string()))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = row.into_iter();
            let (name, reported_type, ordinal) = (
                cells.next().flatten(),
                cells.next().flatten(),
                cells.next().flatten(),
            );
            let (Some(name), Some(reported_type), Some(ordinal)) = (name, reported_type, ordinal)
            else {
                return Err(TabsumError::discovery(
                    &self.instance_id,
                    format!("incomplete column row for table {}", table),
                ));
            };
            let ordinal: u32 = ordinal.trim().parse().map_err(|_| {
                TabsumError::discovery(
                    &self.instance_id,
                    format!("invalid ordinal position '{}' in table {}", ordinal, table),
                )
            })?;
            validate_identifier(&name)?;
            columns.push(ColumnDescriptor::new(name, reported_type.trim(), ordinal));
        }

        if columns.is_empty() {
            return Err(TabsumError::discovery(
                &self.instance_id,
                format!("table {}.{} has no columns", schema, table),
            ));
        }
        columns.sort_by_key(|c| c.ordinal_position);
        Ok(columns)
    }

    async fn table_checksum(&mut self, table: &str, sql: &str) -> Result<(u64, String)> {
        let rows = self
            .conn
            .query(sql)
            .await
            .map_err(|e| TabsumError::query(&self.instance_id, table, e.to_string()))?;

        let invalid = |message: String| TabsumError::query(&self.instance_id, table, message);

        let row = match rows.as_slice() {
            [row] => row,
            other => return Err(invalid(format!("expected one result row, got {}", other.len()))),
        };
        let (row_count, checksum) = match row.as_slice() {
            [Some(row_count), Some(checksum), ..] => (row_count, checksum),
            _ => return Err(invalid("NUMROWS or CHECKSUM is NULL".into())),
        };

        let row_count: u64 = row_count
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid row count '{}'", row_count)))?;
        let checksum = normalize_checksum(checksum)
            .ok_or_else(|| invalid(format!("invalid checksum '{}'", checksum)))?;
        Ok((row_count, checksum))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await
    }
}

/// Open a connection for one engine.
async fn open_connection(instance: &InstanceConfig, secret: &Secret) -> Result<Box<dyn Connection>> {
    match instance.dialect {
        DialectKind::Mssql => Ok(Box::new(
            super::MssqlConnection::connect(instance, secret).await?,
        )),
        DialectKind::Mysql => Ok(Box::new(
            super::MysqlConnection::connect(instance, secret).await?,
        )),
        DialectKind::Postgresql => Ok(Box::new(
            super::PostgresConnection::connect(instance, secret).await?,
        )),
        DialectKind::Exasol => {
            open_odbc(instance, super::exasol::connection_string(instance, secret.expose())).await
        }
        DialectKind::Oracle => {
            open_odbc(instance, super::oracle::connection_string(instance, secret.expose())).await
        }
    }
}

#[cfg(feature = "odbc")]
async fn open_odbc(instance: &InstanceConfig, connection_string: String) -> Result<Box<dyn Connection>> {
    debug!(
        instance = %instance.instance_id,
        "Connecting via ODBC to {}:{}", instance.host, instance.port
    );
    Ok(Box::new(
        super::common::OdbcConnection::connect(connection_string).await?,
    ))
}

#[cfg(not(feature = "odbc"))]
async fn open_odbc(instance: &InstanceConfig, _connection_string: String) -> Result<Box<dyn Connection>> {
    Err(TabsumError::Config(format!(
        "{}: {} sessions require the `odbc` feature",
        instance.instance_id, instance.dialect
    )))
}

/// Open a session for `instance` and run its session setup.
///
/// Driver failures are reported as `Connection` errors naming the instance; a
/// missing build feature stays a `Config` error.
pub async fn connect(instance: &InstanceConfig, secret: &Secret) -> Result<Box<dyn CatalogSession>> {
    let conn = open_connection(instance, secret).await.map_err(|e| match e {
        TabsumError::Config(_) => e,
        other => TabsumError::connection(&instance.instance_id, other.to_string()),
    })?;

    let mut session = SqlSession::new(
        instance.instance_id.clone(),
        DialectImpl::from_kind(instance.dialect),
        conn,
    );
    session.setup().await?;
    Ok(Box::new(session))
}
