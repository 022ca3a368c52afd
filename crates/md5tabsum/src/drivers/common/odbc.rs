//! ODBC connection for engines reached through a driver manager (Exasol, Oracle).
//!
//! `odbc-api` is blocking, so every call moves the connection onto
//! `tokio::task::spawn_blocking` and takes it back afterwards.

use std::sync::OnceLock;

use async_trait::async_trait;
use odbc_api::buffers::TextRowSet;
use odbc_api::{ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use tracing::debug;

use crate::core::traits::{Connection, TextRow};
use crate::error::{Result, TabsumError};

/// Rows fetched per round trip.
const BATCH_SIZE: usize = 1000;

/// Upper bound for one text cell. Checksums and catalog names are far shorter.
const MAX_TEXT_LEN: usize = 4096;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

fn environment() -> Result<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new()?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

type OdbcHandle = odbc_api::Connection<'static>;

/// A single ODBC connection.
pub struct OdbcConnection {
    conn: Option<OdbcHandle>,
}

impl OdbcConnection {
    /// Connect with a full ODBC connection string.
    pub async fn connect(connection_string: String) -> Result<Self> {
        let conn = tokio::task::spawn_blocking(move || -> Result<OdbcHandle> {
            let env = environment()?;
            Ok(env.connect_with_connection_string(
                &connection_string,
                ConnectionOptions::default(),
            )?)
        })
        .await
        .map_err(|e| TabsumError::Config(format!("ODBC connect task failed: {}", e)))??;
        Ok(Self { conn: Some(conn) })
    }

    async fn with_conn<T, F>(&mut self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&OdbcHandle) -> Result<T> + Send + 'static,
    {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| TabsumError::Config("ODBC connection is no longer usable".into()))?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(&conn);
            (conn, result)
        })
        .await
        .map_err(|e| TabsumError::Config(format!("ODBC task failed: {}", e)))?;
        self.conn = Some(conn);
        result
    }
}

fn fetch_text_rows(conn: &OdbcHandle, sql: &str) -> Result<Vec<TextRow>> {
    let mut rows = Vec::new();

    if let Some(mut cursor) = conn.execute(sql, ())? {
        let num_cols = cursor.num_result_cols()? as usize;
        let mut buffers = TextRowSet::for_cursor(BATCH_SIZE, &mut cursor, Some(MAX_TEXT_LEN))?;
        let mut row_cursor = cursor.bind_buffer(&mut buffers)?;

        while let Some(batch) = row_cursor.fetch()? {
            for row_idx in 0..batch.num_rows() {
                let row = (0..num_cols)
                    .map(|col_idx| {
                        batch
                            .at(col_idx, row_idx)
                            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    })
                    .collect();
                rows.push(row);
            }
        }
    }

    Ok(rows)
}

#[async_trait]
impl Connection for OdbcConnection {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.with_conn(move |conn| {
            conn.execute(&sql, ())?;
            Ok(())
        })
        .await
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<TextRow>> {
        let sql = sql.to_string();
        let rows = self.with_conn(move |conn| fetch_text_rows(conn, &sql)).await?;
        debug!("ODBC query returned {} rows", rows.len());
        Ok(rows)
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            tokio::task::spawn_blocking(move || drop(conn))
                .await
                .map_err(|e| TabsumError::Config(format!("ODBC task failed: {}", e)))?;
        }
        Ok(())
    }
}
