//! Database driver implementations.
//!
//! This module provides database-specific implementations of the core traits:
//!
//! - [`exasol`]: Exasol (ODBC)
//! - [`mssql`]: Microsoft SQL Server (Tiberius)
//! - [`mysql`]: MySQL/MariaDB (SQLx)
//! - [`oracle`]: Oracle (ODBC)
//! - [`postgres`]: PostgreSQL (tokio-postgres)
//! - [`common`]: Shared utilities (TLS, ODBC)
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `Dialect`: SQL syntax strategy for the database engine
//! - `Connection`: one live connection returning text rows
//!
//! [`SqlSession`] joins the two into a `CatalogSession`, and [`connect`] opens one
//! for a configured instance.
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` with a `Dialect` and a `Connection`
//! 2. Add a variant to `DialectKind` and to `DialectImpl`
//! 3. Open its connection in `session::open_connection`

pub mod common;
pub mod exasol;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;
mod session;

// Re-export common utilities
pub use common::{SslMode, TlsBuilder};

// Re-export driver types
pub use exasol::ExasolDialect;
pub use mssql::{MssqlConnection, MssqlDialect};
pub use mysql::{MysqlConnection, MysqlDialect};
pub use oracle::OracleDialect;
pub use postgres::{PostgresConnection, PostgresDialect};
pub use session::{connect, SqlSession};

use crate::core::schema::ColumnDescriptor;
use crate::core::traits::Dialect;
use crate::dialect::DialectKind;

/// Enum-based static dispatch for dialects.
///
/// The compiler generates a match statement instead of using vtable dispatch.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Exasol(ExasolDialect),
    Mysql(MysqlDialect),
    Mssql(MssqlDialect),
    Oracle(OracleDialect),
    Postgres(PostgresDialect),
}

macro_rules! dispatch {
    ($self:expr, $d:ident => $call:expr) => {
        match $self {
            DialectImpl::Exasol($d) => $call,
            DialectImpl::Mysql($d) => $call,
            DialectImpl::Mssql($d) => $call,
            DialectImpl::Oracle($d) => $call,
            DialectImpl::Postgres($d) => $call,
        }
    };
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        dispatch!(self, d => d.name())
    }

    fn quote_ident(&self, name: &str) -> String {
        dispatch!(self, d => d.quote_ident(name))
    }

    fn default_port(&self) -> u16 {
        dispatch!(self, d => d.default_port())
    }

    fn session_setup(&self) -> &'static [&'static str] {
        dispatch!(self, d => d.session_setup())
    }

    fn tables_query(&self, schema: &str, pattern: &str) -> String {
        dispatch!(self, d => d.tables_query(schema, pattern))
    }

    fn columns_query(&self, schema: &str, table: &str) -> String {
        dispatch!(self, d => d.columns_query(schema, table))
    }

    fn render_column_expression(&self, column: &ColumnDescriptor) -> String {
        dispatch!(self, d => d.render_column_expression(column))
    }

    fn render_row_hash_query(&self, schema: &str, table: &str, column_exprs: &[String]) -> String {
        dispatch!(self, d => d.render_row_hash_query(schema, table, column_exprs))
    }

    fn render_aggregation_query(&self, row_hash_subquery: &str) -> String {
        dispatch!(self, d => d.render_aggregation_query(row_hash_subquery))
    }
}

impl DialectImpl {
    /// The dialect for a configured engine.
    pub fn from_kind(kind: DialectKind) -> Self {
        match kind {
            DialectKind::Exasol => DialectImpl::Exasol(ExasolDialect::new()),
            DialectKind::Mysql => DialectImpl::Mysql(MysqlDialect::new()),
            DialectKind::Mssql => DialectImpl::Mssql(MssqlDialect::new()),
            DialectKind::Oracle => DialectImpl::Oracle(OracleDialect::new()),
            DialectKind::Postgresql => DialectImpl::Postgres(PostgresDialect::new()),
        }
    }

    /// Create a dialect from a dialect name such as `"postgresql"`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is not a supported dialect.
    pub fn from_name(name: &str) -> crate::error::Result<Self> {
        Ok(Self::from_kind(name.parse()?))
    }
}
