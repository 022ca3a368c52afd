//! Core traits for engine-agnostic checksumming.
//!
//! - [`Dialect`]: SQL rendering strategy for one engine (discovery, canonicalization, hashing)
//! - [`Connection`]: one live connection that executes SQL and returns text rows
//! - [`CatalogSession`]: the discovery and checksum operations an instance runner drives
//!
//! A dialect never touches the network; a connection never builds SQL. `SqlSession`
//! (in `drivers`) joins the two. Tests substitute their own `CatalogSession`.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::ColumnDescriptor;

/// One result row with every cell rendered as text. `None` is SQL NULL.
pub type TextRow = Vec<Option<String>>;

/// SQL syntax strategy for one database engine.
///
/// Every method is pure string building. Identifiers passed in have already been
/// validated; implementations only quote them.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier ("exasol", "mysql", "mssql", "oracle", "postgresql").
    fn name(&self) -> &str;

    /// Quote an identifier (schema, table or column name).
    fn quote_ident(&self, name: &str) -> String;

    /// Qualify a table with its schema.
    fn qualify(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }

    /// Standard listener port of the engine.
    fn default_port(&self) -> u16;

    /// Statements executed once right after connecting.
    fn session_setup(&self) -> &'static [&'static str] {
        &[]
    }

    /// Catalog query returning one column: the names of tables in `schema` whose
    /// name matches the LIKE `pattern`, case-insensitively.
    fn tables_query(&self, schema: &str, pattern: &str) -> String;

    /// Catalog query returning `(name, reported_type, ordinal_position)` for every
    /// column of `schema.table`, ordered by ordinal position.
    fn columns_query(&self, schema: &str, table: &str) -> String;

    /// SQL fragment rendering one column's value as its canonical string.
    fn render_column_expression(&self, column: &ColumnDescriptor) -> String;

    /// Query selecting one `ROWHASH` (32 hex chars) per row of `schema.table`.
    fn render_row_hash_query(&self, schema: &str, table: &str, column_exprs: &[String])
        -> String;

    /// Query reducing a row-hash subquery to one row `(NUMROWS, CHECKSUM)`.
    fn render_aggregation_query(&self, row_hash_subquery: &str) -> String;
}

/// A single live connection owned by one instance runner.
#[async_trait]
pub trait Connection: Send {
    /// Execute a statement that returns no rows.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Run a query and collect every row as text.
    async fn query(&mut self, sql: &str) -> Result<Vec<TextRow>>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// The operations an instance runner needs from an open session.
#[async_trait]
pub trait CatalogSession: Send {
    /// SQL strategy of the engine behind this session.
    fn dialect(&self) -> &dyn Dialect;

    /// Names of tables in `schema` matching `pattern`. Empty when nothing matches.
    async fn discover_tables(&mut self, schema: &str, pattern: &str) -> Result<Vec<String>>;

    /// Columns of `schema.table` in ordinal order.
    async fn discover_columns(&mut self, schema: &str, table: &str)
        -> Result<Vec<ColumnDescriptor>>;

    /// Run a rendered aggregation query for `table`, returning `(row_count, checksum_hex)`.
    async fn table_checksum(&mut self, table: &str, sql: &str) -> Result<(u64, String)>;

    /// Release the underlying connection.
    async fn close(self: Box<Self>) -> Result<()>;
}
